//! The control loop

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mend_detect::AnomalyDetector;
use mend_executor::{ActionExecutor, CompletionEvent};
use mend_ingest::{MetricsIngester, SampleBuffer};
use mend_ledger::{AuditLedger, AuditRecord};
use mend_observe::EngineMetrics;
use mend_policy::{ActionPolicyEngine, GateDecision, SafetyGate, SafetyLimits};
use mend_types::{OutcomeKind, RemediationAction, ServiceHealthRecord, ServiceId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::ControlResult;
use crate::notify::{NotificationSink, NotifyDetails, Severity};

/// Control-loop phases, in tick order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Collecting,
    Detecting,
    Proposing,
    Gating,
    Executing,
    Auditing,
}

impl LoopPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopPhase::Collecting => "collecting",
            LoopPhase::Detecting => "detecting",
            LoopPhase::Proposing => "proposing",
            LoopPhase::Gating => "gating",
            LoopPhase::Executing => "executing",
            LoopPhase::Auditing => "auditing",
        }
    }
}

/// Loop tuning
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Wall-clock interval between ticks
    pub tick_interval: Duration,

    /// Completed executions considered for escalation
    pub escalation_window: usize,

    /// Failure ratio over the window that triggers a Critical notification
    pub escalation_failure_ratio: f64,

    /// Outcomes required before the ratio is evaluated
    pub escalation_min_outcomes: usize,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            escalation_window: 10,
            escalation_failure_ratio: 0.5,
            escalation_min_outcomes: 4,
        }
    }
}

/// What one tick did; returned for tests and debugging
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub records: usize,
    pub anomalies: usize,
    pub proposals: usize,
    pub authorized: usize,
    pub blocked: usize,
    pub completions: usize,
}

/// One monitoring domain's remediation loop
pub struct ControlLoop {
    config: ControlLoopConfig,
    ingester: Arc<MetricsIngester>,
    detector: AnomalyDetector,
    engine: ActionPolicyEngine,
    gate: SafetyGate,
    limits: Arc<SafetyLimits>,
    executor: ActionExecutor,
    completions: mpsc::UnboundedReceiver<CompletionEvent>,
    ledger: Arc<dyn AuditLedger>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<EngineMetrics>,

    /// Recent execution results for escalation, newest last
    recent_outcomes: VecDeque<bool>,
    escalated: bool,

    /// Dispatched actions whose completion event has not been drained yet
    outstanding: usize,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControlLoopConfig,
        ingester: Arc<MetricsIngester>,
        detector: AnomalyDetector,
        engine: ActionPolicyEngine,
        gate: SafetyGate,
        limits: Arc<SafetyLimits>,
        executor: ActionExecutor,
        completions: mpsc::UnboundedReceiver<CompletionEvent>,
        ledger: Arc<dyn AuditLedger>,
        notifier: Arc<dyn NotificationSink>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            config,
            ingester,
            detector,
            engine,
            gate,
            limits,
            executor,
            completions,
            ledger,
            notifier,
            metrics,
            recent_outcomes: VecDeque::new(),
            escalated: false,
            outstanding: 0,
        }
    }

    /// Run ticks on the configured interval until shutdown is signalled.
    pub fn spawn(self) -> ControlLoopHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        ControlLoopHandle { stop_tx, task }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        info!(interval_secs = self.config.tick_interval.as_secs(), "Control loop started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_tick_at(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Control loop stopping");
                        break;
                    }
                }
            }
        }
        // Already-dispatched provider calls run to completion (or time
        // out) and must still be audited before the loop exits.
        self.drain_outstanding().await;
    }

    /// Run one tick against an injected clock.
    #[instrument(skip(self), fields(now = %now))]
    pub async fn run_tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        // Collecting
        let records = self.ingester.collect_all(now).await;
        report.records = records.len();
        let by_service: HashMap<ServiceId, ServiceHealthRecord> = records
            .iter()
            .map(|r| (r.service_id.clone(), r.clone()))
            .collect();

        // Detecting
        let mut anomalies = Vec::new();
        for record in &records {
            let buffer = self
                .ingester
                .buffer(&record.service_id)
                .unwrap_or_else(|| SampleBuffer::new(Duration::from_secs(3600)));
            for event in self.detector.detect(record, &buffer, now) {
                self.metrics.record_anomaly(&event.strategy.to_string());
                anomalies.push(event);
            }
        }
        report.anomalies = anomalies.len();

        // Proposing
        let effectiveness = match self.ledger.effectiveness().await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "Effectiveness snapshot unavailable, proposing without it");
                self.metrics.record_phase_error(LoopPhase::Proposing.as_str());
                HashMap::new()
            }
        };
        let mut proposals = Vec::new();
        for event in &anomalies {
            let Some(record) = by_service.get(&event.service_id) else {
                debug!(service_id = %event.service_id, "Anomaly for service without a record");
                continue;
            };
            if let Some(action) = self.engine.propose(event, record, &effectiveness, now) {
                self.metrics.proposals_total.inc();
                proposals.push(action);
            }
        }
        report.proposals = proposals.len();

        // Gating
        let mut approved = Vec::new();
        for mut action in proposals {
            match self.gate.authorize(&mut action, &self.limits, now) {
                Ok(GateDecision::Authorized) => approved.push(action),
                Ok(GateDecision::Blocked(reason)) => {
                    // Blocks never reach the ledger; the counter and the
                    // notification are their record (dry-run blocks also
                    // land in the dry-run log inside SafetyLimits).
                    report.blocked += 1;
                    self.metrics.record_block(reason.as_label());
                    let details = NotifyDetails::from([
                        ("action_id".into(), action.id.to_string()),
                        ("kind".into(), action.kind.label().to_string()),
                        ("service_id".into(), action.service_id.to_string()),
                        ("reason".into(), reason.as_label().to_string()),
                    ]);
                    self.notifier
                        .notify(
                            Severity::Info,
                            &format!(
                                "remediation {} on {} blocked: {reason}",
                                action.kind.label(),
                                action.service_id
                            ),
                            &details,
                        )
                        .await;
                }
                Err(e) => {
                    warn!(error = %e, "Gate received an action in the wrong state");
                    self.metrics.record_phase_error(LoopPhase::Gating.as_str());
                }
            }
        }
        report.authorized = approved.len();

        // Executing
        for action in approved {
            let action_id = action.id.clone();
            match self.executor.dispatch(action) {
                Ok(()) => self.outstanding += 1,
                Err(e) => {
                    warn!(action_id = %action_id, error = %e, "Dispatch failed");
                    self.metrics.record_phase_error(LoopPhase::Executing.as_str());
                }
            }
        }

        // Auditing
        report.completions = self.audit(now).await;

        self.metrics.loop_runs_total.inc();
        debug!(
            records = report.records,
            anomalies = report.anomalies,
            proposals = report.proposals,
            authorized = report.authorized,
            blocked = report.blocked,
            completions = report.completions,
            "Tick complete"
        );
        report
    }

    /// Drain completed executions into the ledger.
    async fn audit(&mut self, now: DateTime<Utc>) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.completions.try_recv() {
            drained += 1;
            self.handle_completion(event, now).await;
        }

        if drained > 0 {
            self.refresh_effectiveness_gauges().await;
            self.check_escalation().await;
        }
        drained
    }

    /// Shutdown drain: wait out every dispatched action so its outcome
    /// still lands in the ledger and its in-flight slot is released.
    async fn drain_outstanding(&mut self) {
        let mut drained = self.audit(Utc::now()).await;
        while self.outstanding > 0 {
            let Some(event) = self.completions.recv().await else {
                break;
            };
            self.handle_completion(event, Utc::now()).await;
            drained += 1;
        }
        if drained > 0 {
            self.refresh_effectiveness_gauges().await;
        }
    }

    async fn handle_completion(&mut self, event: CompletionEvent, now: DateTime<Utc>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.limits
            .end_execution(&event.action.service_id, event.action.kind.label());

        if let Err(e) = self.record_completion(&event, now).await {
            warn!(action_id = %event.action.id, error = %e, "Failed to audit completion");
            self.metrics.record_phase_error(LoopPhase::Auditing.as_str());
        }

        let success = event.outcome.outcome.is_success();
        self.metrics.record_execution(
            event.action.kind.label(),
            event.outcome.outcome.as_label(),
        );
        if let OutcomeKind::Failure { error } = &event.outcome.outcome {
            let details = NotifyDetails::from([
                ("action_id".into(), event.action.id.to_string()),
                ("kind".into(), event.action.kind.label().to_string()),
                ("service_id".into(), event.action.service_id.to_string()),
                ("error".into(), error.clone()),
            ]);
            self.notifier
                .notify(
                    Severity::Warning,
                    &format!(
                        "remediation {} on {} failed: {error}",
                        event.action.kind.label(),
                        event.action.service_id
                    ),
                    &details,
                )
                .await;
        }

        self.recent_outcomes.push_back(success);
        while self.recent_outcomes.len() > self.config.escalation_window {
            self.recent_outcomes.pop_front();
        }
    }

    async fn record_completion(
        &self,
        event: &CompletionEvent,
        now: DateTime<Utc>,
    ) -> ControlResult<()> {
        self.ledger
            .record(AuditRecord::executed(
                event.action.clone(),
                event.outcome.clone(),
                now,
            ))
            .await?;
        Ok(())
    }

    async fn refresh_effectiveness_gauges(&self) {
        if let Ok(scores) = self.ledger.effectiveness().await {
            for (kind, score) in scores {
                if let Some(ratio) = score.ratio() {
                    self.metrics.set_effectiveness(&kind, ratio);
                }
            }
        }
    }

    /// Notify once when the recent failure ratio crosses the bar, re-arm
    /// when it recovers.
    async fn check_escalation(&mut self) {
        if self.recent_outcomes.len() < self.config.escalation_min_outcomes {
            return;
        }
        let failures = self.recent_outcomes.iter().filter(|ok| !**ok).count();
        let ratio = failures as f64 / self.recent_outcomes.len() as f64;

        if ratio > self.config.escalation_failure_ratio {
            if !self.escalated {
                self.escalated = true;
                let details = NotifyDetails::from([
                    ("failure_ratio".into(), format!("{ratio:.2}")),
                    ("window".into(), self.recent_outcomes.len().to_string()),
                ]);
                self.notifier
                    .notify(
                        Severity::Critical,
                        &format!(
                            "remediation failure ratio {ratio:.2} over last {} executions",
                            self.recent_outcomes.len()
                        ),
                        &details,
                    )
                    .await;
            }
        } else {
            self.escalated = false;
        }
    }

    /// Would-be actions recorded while dry-run was enabled.
    pub fn dry_run_log(&self) -> Vec<RemediationAction> {
        self.limits.dry_run_log()
    }
}

/// Handle for stopping a spawned loop
pub struct ControlLoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ControlLoopHandle {
    /// Signal shutdown and wait for the final drain.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}
