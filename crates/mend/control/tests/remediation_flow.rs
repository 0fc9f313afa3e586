//! End-to-end remediation scenarios driven tick by tick

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mend_control::{ControlLoop, ControlLoopConfig, MemorySink, Severity};
use mend_detect::{AnomalyDetector, ThresholdStrategy};
use mend_executor::testing::{FailingExecution, NoOpExecution};
use mend_executor::{ActionExecution, ActionExecutor, ExecutorConfig};
use mend_ingest::{IngesterConfig, MetricsIngester, ServiceDescriptor, StaticProbe};
use mend_ledger::{AuditFilter, AuditLedger, MemoryAuditLedger};
use mend_observe::EngineMetrics;
use mend_policy::{ActionPolicyEngine, SafetyGate, SafetyLimits};
use mend_types::{
    ActionKind, ActionStatus, HealthStatus, MetricThreshold, PolicyConfig, ServiceHealthRecord,
    ServiceId, ServiceType,
};
use prometheus::Registry;

struct Harness {
    control: ControlLoop,
    probe: Arc<StaticProbe>,
    ledger: Arc<MemoryAuditLedger>,
    sink: Arc<MemorySink>,
}

fn build(
    execution: Arc<dyn ActionExecution>,
    configure: impl FnOnce(&mut PolicyConfig),
) -> Harness {
    let mut policy = PolicyConfig::default();
    policy
        .thresholds
        .insert("gpu_utilization".into(), MetricThreshold::band(0.10, 0.90, 15));
    policy
        .thresholds
        .insert("error_rate".into(), MetricThreshold::high(0.5, 0));
    configure(&mut policy);

    let probe = Arc::new(StaticProbe::new());
    let ingester = Arc::new(MetricsIngester::new(
        IngesterConfig::default(),
        probe.clone(),
    ));
    let detector = AnomalyDetector::new(Box::new(ThresholdStrategy::new(policy.clone())));
    let engine = ActionPolicyEngine::new(policy.clone());
    let gate = SafetyGate::new(policy);
    let limits = Arc::new(SafetyLimits::new());
    let (executor, completions) = ActionExecutor::new(
        execution,
        probe.clone(),
        Arc::clone(&limits),
        ExecutorConfig {
            execution_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(30),
        },
    );
    let ledger = Arc::new(MemoryAuditLedger::new());
    let sink = Arc::new(MemorySink::new());
    let metrics = Arc::new(EngineMetrics::new(&Registry::new()));

    let control = ControlLoop::new(
        ControlLoopConfig::default(),
        ingester.clone(),
        detector,
        engine,
        gate,
        limits,
        executor,
        completions,
        ledger.clone(),
        sink.clone(),
        metrics,
    );

    ingester.register_service(ServiceDescriptor::new("gpu-1", ServiceType::GpuFleet));
    ingester.register_service(ServiceDescriptor::new("db-1", ServiceType::Database));

    Harness {
        control,
        probe,
        ledger,
        sink,
    }
}

fn gpu_record(utilization: f64, at: DateTime<Utc>) -> ServiceHealthRecord {
    ServiceHealthRecord::new(
        ServiceId::new("gpu-1"),
        ServiceType::GpuFleet,
        HealthStatus::Degraded,
        at,
    )
    .with_metric("gpu_utilization", utilization)
    .with_metric("instance_count", 4.0)
}

fn db_record(status: HealthStatus, error_rate: f64, at: DateTime<Utc>) -> ServiceHealthRecord {
    ServiceHealthRecord::new(ServiceId::new("db-1"), ServiceType::Database, status, at)
        .with_metric("error_rate", error_rate)
}

fn minutes(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

async fn settle() {
    // Past the executor's settle delay; paused time auto-advances
    tokio::time::sleep(Duration::from_secs(31)).await;
}

#[tokio::test(start_paused = true)]
async fn test_sustained_gpu_saturation_provisions_exactly_once() {
    let execution = Arc::new(NoOpExecution::new());
    let mut harness = build(execution.clone(), |_| {});
    let t0 = Utc::now();

    // 95% utilization held across 17 minute-ticks
    let mut authorized = 0;
    for minute in 0..=16 {
        let now = t0 + minutes(minute);
        harness.probe.set(gpu_record(0.95, now));
        harness.probe.set(db_record(HealthStatus::Healthy, 0.01, now));
        let report = harness.control.run_tick_at(now).await;
        authorized += report.authorized;
    }
    assert_eq!(authorized, 1);

    settle().await;
    let report = harness.control.run_tick_at(t0 + minutes(17)).await;
    assert_eq!(report.completions, 1);
    assert_eq!(execution.applied(), 1);

    let records = harness
        .ledger
        .query(&AuditFilter::default().with_status(ActionStatus::Succeeded))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.action.kind, ActionKind::ProvisionInstance);
    assert!((record.action.estimated_cost_impact - 2.5).abs() < 1e-9);
    assert!(!record.outcome.metrics_before.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_idle_gpu_fleet_terminates_an_instance() {
    let execution = Arc::new(NoOpExecution::new());
    let mut harness = build(execution, |_| {});
    let t0 = Utc::now();

    for minute in 0..=16 {
        let now = t0 + minutes(minute);
        harness.probe.set(gpu_record(0.04, now));
        harness.probe.set(db_record(HealthStatus::Healthy, 0.01, now));
        harness.control.run_tick_at(now).await;
    }
    settle().await;
    harness.control.run_tick_at(t0 + minutes(17)).await;

    let records = harness
        .ledger
        .query(&AuditFilter::default().with_status(ActionStatus::Succeeded))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].action.kind,
        ActionKind::TerminateInstance { instance: None }
    );
    assert!(records[0].action.estimated_cost_impact < 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_brief_spike_never_reaches_the_policy_engine() {
    let execution = Arc::new(NoOpExecution::new());
    let mut harness = build(execution.clone(), |_| {});
    let t0 = Utc::now();

    // Spike for 5 minutes, then recover
    for minute in 0..=20 {
        let now = t0 + minutes(minute);
        let utilization = if minute < 5 { 0.95 } else { 0.50 };
        harness.probe.set(gpu_record(utilization, now));
        harness.probe.set(db_record(HealthStatus::Healthy, 0.01, now));
        let report = harness.control.run_tick_at(now).await;
        assert_eq!(report.anomalies, 0);
    }
    assert_eq!(execution.applied(), 0);
    assert!(harness.ledger.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_critical_database_restarts_without_sustain() {
    let execution = Arc::new(NoOpExecution::new());
    let mut harness = build(execution, |_| {});
    let t0 = Utc::now();

    harness.probe.set(gpu_record(0.50, t0));
    harness.probe.set(db_record(HealthStatus::Critical, 0.01, t0));
    let report = harness.control.run_tick_at(t0).await;
    assert_eq!(report.anomalies, 1);
    assert_eq!(report.authorized, 1);

    settle().await;
    harness.control.run_tick_at(t0 + minutes(1)).await;

    let records = harness
        .ledger
        .query(&AuditFilter::for_service(ServiceId::new("db-1")))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action.kind, ActionKind::RestartService);
    assert_eq!(records[0].action.status, ActionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_blocks_repeat_remediation() {
    let execution = Arc::new(NoOpExecution::new());
    // Zero sustain so every confirmed breach maps straight to an action
    let mut harness = build(execution.clone(), |c| {
        c.thresholds
            .insert("error_rate".into(), MetricThreshold::high(0.5, 0));
        c.default_cooldown_minutes = 30;
    });
    let t0 = Utc::now();

    harness.probe.set(gpu_record(0.50, t0));
    harness.probe.set(db_record(HealthStatus::Degraded, 0.9, t0));
    assert_eq!(harness.control.run_tick_at(t0).await.authorized, 1);
    settle().await;
    harness.control.run_tick_at(t0 + minutes(1)).await;

    // Recover, then breach again inside the cooldown window
    harness
        .probe
        .set(db_record(HealthStatus::Degraded, 0.1, t0 + minutes(2)));
    harness.control.run_tick_at(t0 + minutes(2)).await;
    harness
        .probe
        .set(db_record(HealthStatus::Degraded, 0.9, t0 + minutes(3)));
    let report = harness.control.run_tick_at(t0 + minutes(3)).await;
    assert_eq!(report.authorized, 0);
    assert_eq!(report.blocked, 1);

    // The block is notified, never audited; only the first restart landed
    assert!(harness
        .sink
        .messages()
        .iter()
        .any(|(severity, message, details)| *severity == Severity::Info
            && message.contains("blocked")
            && details.get("reason").map(String::as_str) == Some("cooldown")));
    assert_eq!(harness.ledger.len(), 1);
    assert_eq!(execution.applied(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_blocks_everything_and_writes_nothing() {
    let execution = Arc::new(NoOpExecution::new());
    let mut harness = build(execution.clone(), |c| c.dry_run = true);
    let t0 = Utc::now();

    harness.probe.set(gpu_record(0.50, t0));
    harness.probe.set(db_record(HealthStatus::Critical, 0.01, t0));
    let report = harness.control.run_tick_at(t0).await;

    assert_eq!(report.proposals, 1);
    assert_eq!(report.blocked, 1);
    assert_eq!(report.authorized, 0);
    assert_eq!(execution.applied(), 0);
    // Dry-run leaves the ledger untouched; the would-be action is logged
    assert!(harness.ledger.is_empty());
    let log = harness.control.dry_run_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, ActionKind::RestartService);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_loop_ticks_and_stops_cleanly() {
    let execution = Arc::new(NoOpExecution::new());
    let harness = build(execution.clone(), |_| {});
    let now = Utc::now();
    harness.probe.set(gpu_record(0.50, now));
    harness.probe.set(db_record(HealthStatus::Healthy, 0.01, now));

    let handle = harness.control.spawn();
    // Let a few interval ticks fire under paused time
    tokio::time::sleep(Duration::from_secs(185)).await;
    handle.stop().await;

    // Healthy fleet: ticks ran, nothing was remediated
    assert_eq!(execution.applied(), 0);
    assert!(harness.ledger.is_empty());
    assert!(harness.sink.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_action_audit() {
    let execution = Arc::new(NoOpExecution::new());
    let harness = build(execution.clone(), |_| {});
    let t0 = Utc::now();
    harness.probe.set(gpu_record(0.50, t0));
    harness.probe.set(db_record(HealthStatus::Critical, 0.01, t0));

    let ledger = harness.ledger.clone();
    let handle = harness.control.spawn();
    // First interval tick fires immediately and dispatches the restart
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(execution.applied(), 1);
    assert!(ledger.is_empty());

    // Stop lands inside the settle delay; the outcome is still audited
    handle.stop().await;
    let records = ledger.query(&AuditFilter::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action.status, ActionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_audit_trail_survives_restart_with_file_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut policy = PolicyConfig::default();
    policy
        .thresholds
        .insert("error_rate".into(), MetricThreshold::high(0.5, 0));

    let probe = Arc::new(StaticProbe::new());
    let ingester = Arc::new(MetricsIngester::new(
        IngesterConfig::default(),
        probe.clone(),
    ));
    ingester.register_service(ServiceDescriptor::new("db-1", ServiceType::Database));
    let limits = Arc::new(SafetyLimits::new());
    let (executor, completions) = ActionExecutor::new(
        Arc::new(NoOpExecution::new()),
        probe.clone(),
        Arc::clone(&limits),
        ExecutorConfig::default(),
    );
    let ledger: Arc<dyn AuditLedger> =
        Arc::new(mend_ledger::FileAuditLedger::open(&path).unwrap());

    let mut control = ControlLoop::new(
        ControlLoopConfig::default(),
        ingester,
        AnomalyDetector::new(Box::new(ThresholdStrategy::new(policy.clone()))),
        ActionPolicyEngine::new(policy.clone()),
        SafetyGate::new(policy),
        limits,
        executor,
        completions,
        ledger,
        Arc::new(MemorySink::new()),
        Arc::new(EngineMetrics::new(&Registry::new())),
    );

    let t0 = Utc::now();
    probe.set(db_record(HealthStatus::Degraded, 0.9, t0));
    assert_eq!(control.run_tick_at(t0).await.authorized, 1);
    settle().await;
    assert_eq!(control.run_tick_at(t0 + minutes(1)).await.completions, 1);
    drop(control);

    // A restarted engine sees the same history
    let reopened = mend_ledger::FileAuditLedger::open(&path).unwrap();
    let records = reopened
        .query(&AuditFilter::default().with_status(ActionStatus::Succeeded))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    let scores = reopened.effectiveness().await.unwrap();
    assert_eq!(scores.get("restart_service").unwrap().success_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_escalate_once() {
    let execution = Arc::new(FailingExecution::permanent("provider down"));
    let mut harness = build(execution, |c| {
        c.max_actions_per_hour = 20;
    });
    let t0 = Utc::now();

    // Failed actions stamp no cooldown, so alternating breach/recovery
    // cycles keep producing restart attempts until the window fills.
    let probe = harness.probe.clone();
    let mut failures_seen = 0;
    let mut minute = 0i64;
    while failures_seen < 4 {
        let now = t0 + minutes(minute);
        probe.set(gpu_record(0.50, now));
        // Alternate recovery and breach so the hysteresis latch re-arms
        let rate = if minute % 2 == 0 { 0.9 } else { 0.1 };
        probe.set(db_record(HealthStatus::Degraded, rate, now));
        let report = harness.control.run_tick_at(now).await;
        if report.authorized > 0 {
            // Failing executor completes fast; drain on the next tick
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        failures_seen += report.completions;
        minute += 1;
        assert!(minute < 60, "escalation scenario did not converge");
    }

    assert_eq!(harness.sink.count_at(Severity::Critical), 1);
    assert!(harness.sink.count_at(Severity::Warning) >= 4);
}
