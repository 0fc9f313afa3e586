//! Action dispatch and lifecycle driving

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use mend_ingest::HealthProbe;
use mend_policy::SafetyLimits;
use mend_types::{ActionId, ActionOutcome, ActionStatus, RemediationAction, ServiceId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{ExecutionError, ExecutorError, ExecutorResult};
use crate::execution::ActionExecution;

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-attempt timeout on the provider call
    pub execution_timeout: Duration,

    /// Delay between success and the post-execution metric capture
    pub settle_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(30),
        }
    }
}

/// Terminal result of one dispatched action
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    /// The action in Succeeded or Failed status
    pub action: RemediationAction,

    /// Outcome ready for the audit ledger
    pub outcome: ActionOutcome,
}

/// Dispatches approved actions and drives them to a terminal status
///
/// Each dispatch spawns a task; completion events arrive on the channel
/// returned by [`ActionExecutor::new`] in completion order, not dispatch
/// order.
pub struct ActionExecutor {
    execution: Arc<dyn ActionExecution>,
    probe: Arc<dyn HealthProbe>,
    limits: Arc<SafetyLimits>,
    config: ExecutorConfig,
    events: mpsc::UnboundedSender<CompletionEvent>,
    /// Terminal actions kept for rollback lookup
    completed: Arc<DashMap<ActionId, RemediationAction>>,
}

impl ActionExecutor {
    pub fn new(
        execution: Arc<dyn ActionExecution>,
        probe: Arc<dyn HealthProbe>,
        limits: Arc<SafetyLimits>,
        config: ExecutorConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                execution,
                probe,
                limits,
                config,
                events,
                completed: Arc::new(DashMap::new()),
            },
            receiver,
        )
    }

    /// Dispatch one approved action.
    ///
    /// Claims the per-(service, kind) in-flight slot before spawning; the
    /// control loop releases it when it drains the completion event.
    pub fn dispatch(&self, action: RemediationAction) -> ExecutorResult<()> {
        if action.status != ActionStatus::Approved {
            return Err(ExecutorError::InvalidTransition(
                mend_types::TransitionError {
                    from: action.status,
                    to: ActionStatus::Executing,
                },
            ));
        }
        if !self
            .limits
            .try_begin_execution(&action.service_id, action.kind.label())
        {
            return Err(ExecutorError::AlreadyInFlight);
        }

        let execution = Arc::clone(&self.execution);
        let probe = Arc::clone(&self.probe);
        let limits = Arc::clone(&self.limits);
        let completed = Arc::clone(&self.completed);
        let events = self.events.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let event = run_action(action, execution, probe, limits, config).await;
            completed.insert(event.action.id.clone(), event.action.clone());
            if events.send(event).is_err() {
                warn!("Completion event dropped: receiver closed");
            }
        });
        Ok(())
    }

    /// Undo a succeeded reversible action.
    pub async fn rollback(&self, action_id: &ActionId) -> ExecutorResult<RemediationAction> {
        let mut action = self
            .completed
            .get(action_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ExecutorError::UnknownAction(action_id.clone()))?;

        if action.status != ActionStatus::Succeeded {
            return Err(ExecutorError::NotRollbackEligible {
                action_id: action_id.clone(),
                status: action.status,
            });
        }
        if !action.kind.is_reversible() {
            return Err(ExecutorError::NotReversible(action.kind.label()));
        }

        self.execution
            .rollback(&action)
            .await
            .map_err(ExecutorError::RollbackFailed)?;
        action.transition(ActionStatus::RolledBack)?;
        self.completed.insert(action.id.clone(), action.clone());
        info!(action_id = %action.id, kind = action.kind.label(), "Action rolled back");
        Ok(action)
    }

    /// Terminal action by ID, if the executor has seen it complete.
    pub fn completed_action(&self, action_id: &ActionId) -> Option<RemediationAction> {
        self.completed.get(action_id).map(|entry| entry.clone())
    }
}

/// Drive one action from Approved to a terminal status.
async fn run_action(
    mut action: RemediationAction,
    execution: Arc<dyn ActionExecution>,
    probe: Arc<dyn HealthProbe>,
    limits: Arc<SafetyLimits>,
    config: ExecutorConfig,
) -> CompletionEvent {
    if let Err(err) = action.transition(ActionStatus::Executing) {
        // Unreachable given the dispatch guard; fail the single action
        error!(action_id = %action.id, %err, "Dispatch ordering bug");
    }
    debug!(action_id = %action.id, kind = action.kind.label(), "Executing action");

    // Pre-state snapshot. Reversible kinds must have one for rollback;
    // for the rest it is best-effort context.
    let metrics_before = match snapshot(&probe, &action.service_id).await {
        Some(metrics) => metrics,
        None if action.kind.is_reversible() => {
            warn!(
                action_id = %action.id,
                service_id = %action.service_id,
                "Pre-state snapshot failed for reversible action"
            );
            return fail(action, "pre-state snapshot unavailable");
        }
        None => BTreeMap::new(),
    };

    let result = apply_with_retry(&*execution, &action, config.execution_timeout).await;

    match result {
        Ok(()) => {
            let now = Utc::now();
            limits.record_success(&action.service_id, action.kind.label(), now);

            // Let the infrastructure settle before judging the effect
            tokio::time::sleep(config.settle_delay).await;
            let metrics_after = snapshot(&probe, &action.service_id)
                .await
                .unwrap_or_default();

            if let Err(err) = action.transition(ActionStatus::Succeeded) {
                error!(action_id = %action.id, %err, "Lifecycle bug on success");
            }
            info!(
                action_id = %action.id,
                kind = action.kind.label(),
                service_id = %action.service_id,
                "Action succeeded"
            );
            let outcome = ActionOutcome::success(
                action.id.clone(),
                action.kind.clone(),
                action.service_id.clone(),
                action.estimated_cost_impact,
                action.created_at,
                Utc::now(),
            )
            .with_metrics_before(metrics_before)
            .with_metrics_after(metrics_after);
            CompletionEvent { action, outcome }
        }
        Err(err) => {
            warn!(
                action_id = %action.id,
                kind = action.kind.label(),
                %err,
                "Action failed"
            );
            let mut event = fail(action, err.to_string());
            event.outcome.metrics_before = metrics_before;
            event
        }
    }
}

/// One provider attempt plus a single retry on transient failure.
async fn apply_with_retry(
    execution: &dyn ActionExecution,
    action: &RemediationAction,
    timeout: Duration,
) -> Result<(), ExecutionError> {
    match apply_once(execution, action, timeout).await {
        Err(ExecutionError::Transient(reason)) => {
            debug!(action_id = %action.id, %reason, "Retrying after transient failure");
            apply_once(execution, action, timeout).await
        }
        other => other,
    }
}

async fn apply_once(
    execution: &dyn ActionExecution,
    action: &RemediationAction,
    timeout: Duration,
) -> Result<(), ExecutionError> {
    match tokio::time::timeout(timeout, execution.apply(action)).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::Transient(format!(
            "execution timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

async fn snapshot(
    probe: &Arc<dyn HealthProbe>,
    service_id: &ServiceId,
) -> Option<BTreeMap<String, f64>> {
    probe.probe(service_id).await.ok().map(|r| r.metrics)
}

fn fail(mut action: RemediationAction, error: impl Into<String>) -> CompletionEvent {
    if let Err(err) = action.transition(ActionStatus::Failed) {
        error!(action_id = %action.id, %err, "Lifecycle bug on failure");
    }
    let outcome = ActionOutcome::failure(
        action.id.clone(),
        action.kind.clone(),
        action.service_id.clone(),
        action.estimated_cost_impact,
        action.created_at,
        Utc::now(),
        error,
    );
    CompletionEvent { action, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingExecution, FlakyExecution, HangingExecution, NoOpExecution};
    use mend_ingest::StaticProbe;
    use mend_types::{
        ActionKind, HealthStatus, OutcomeKind, RiskTier, ServiceHealthRecord, ServiceType,
    };

    fn approved(kind: ActionKind) -> RemediationAction {
        let mut action = RemediationAction::new(
            kind,
            ServiceId::new("gpu-1"),
            "test",
            2.5,
            RiskTier::Medium,
        );
        action.transition(ActionStatus::Approved).unwrap();
        action
    }

    fn probe_with_record() -> Arc<StaticProbe> {
        let probe = Arc::new(StaticProbe::new());
        probe.set(
            ServiceHealthRecord::new(
                ServiceId::new("gpu-1"),
                ServiceType::GpuFleet,
                HealthStatus::Degraded,
                Utc::now(),
            )
            .with_metric("gpu_utilization", 0.95),
        );
        probe
    }

    fn executor(
        execution: Arc<dyn ActionExecution>,
        probe: Arc<StaticProbe>,
    ) -> (
        ActionExecutor,
        mpsc::UnboundedReceiver<CompletionEvent>,
        Arc<SafetyLimits>,
    ) {
        let limits = Arc::new(SafetyLimits::new());
        let config = ExecutorConfig {
            execution_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(30),
        };
        let (executor, events) =
            ActionExecutor::new(execution, probe, Arc::clone(&limits), config);
        (executor, events, limits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_path_stamps_cooldown_and_captures_metrics() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, limits) = executor(execution.clone(), probe_with_record());

        exec.dispatch(approved(ActionKind::ProvisionInstance)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Succeeded);
        assert_eq!(event.outcome.outcome, OutcomeKind::Success);
        assert_eq!(execution.applied(), 1);
        assert_eq!(
            event.outcome.metrics_before.get("gpu_utilization"),
            Some(&0.95)
        );
        assert!(!event.outcome.metrics_after.is_empty());
        assert!(limits
            .cooldown_remaining(
                &ServiceId::new("gpu-1"),
                "provision_instance",
                Duration::from_secs(600),
                Utc::now(),
            )
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried_once() {
        let execution = Arc::new(FlakyExecution::failing_times(1));
        let (exec, mut events, _) = executor(execution.clone(), probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Succeeded);
        assert_eq!(execution.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_fail_the_action() {
        let execution = Arc::new(FlakyExecution::failing_times(2));
        let (exec, mut events, _) = executor(execution.clone(), probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Failed);
        assert_eq!(execution.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_not_retried_and_no_cooldown() {
        let execution = Arc::new(FailingExecution::permanent("quota exceeded"));
        let (exec, mut events, limits) = executor(execution.clone(), probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Failed);
        assert_eq!(execution.attempts(), 1);
        assert!(event.outcome.metrics_after.is_empty());
        assert!(matches!(
            event.outcome.outcome,
            OutcomeKind::Failure { ref error } if error.contains("quota exceeded")
        ));
        assert!(limits
            .cooldown_remaining(
                &ServiceId::new("gpu-1"),
                "restart_service",
                Duration::from_secs(600),
                Utc::now(),
            )
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_times_out() {
        let execution = Arc::new(HangingExecution);
        let (exec, mut events, _) = executor(execution, probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Failed);
        assert!(matches!(
            event.outcome.outcome,
            OutcomeKind::Failure { ref error } if error.contains("timed out")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reversible_action_needs_pre_state_snapshot() {
        // Empty probe: snapshot fails
        let probe = Arc::new(StaticProbe::new());
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, _) = executor(execution.clone(), probe);

        exec.dispatch(approved(ActionKind::ProvisionInstance)).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.action.status, ActionStatus::Failed);
        // The provider was never called
        assert_eq!(execution.applied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_irreversible_action_runs_without_snapshot() {
        let probe = Arc::new(StaticProbe::new());
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, _) = executor(execution, probe);

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.action.status, ActionStatus::Succeeded);
        assert!(event.outcome.metrics_before.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_kind_same_target_is_rejected_while_in_flight() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, _) = executor(execution, probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let err = exec
            .dispatch(approved(ActionKind::RestartService))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::AlreadyInFlight));

        // The first one still completes
        let event = events.recv().await.unwrap();
        assert_eq!(event.action.status, ActionStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unapproved_action_rejected() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, _events, _) = executor(execution, probe_with_record());

        let pending = RemediationAction::new(
            ActionKind::RestartService,
            ServiceId::new("gpu-1"),
            "test",
            0.0,
            RiskTier::Low,
        );
        assert!(matches!(
            exec.dispatch(pending),
            Err(ExecutorError::InvalidTransition(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_of_succeeded_reversible_action() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, _) = executor(execution.clone(), probe_with_record());

        exec.dispatch(approved(ActionKind::ProvisionInstance)).unwrap();
        let event = events.recv().await.unwrap();

        let rolled_back = exec.rollback(&event.action.id).await.unwrap();
        assert_eq!(rolled_back.status, ActionStatus::RolledBack);
        assert_eq!(execution.rolled_back(), 1);

        // A second rollback is no longer eligible
        assert!(matches!(
            exec.rollback(&event.action.id).await,
            Err(ExecutorError::NotRollbackEligible { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_rejects_irreversible_kind() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, mut events, _) = executor(execution, probe_with_record());

        exec.dispatch(approved(ActionKind::RestartService)).unwrap();
        let event = events.recv().await.unwrap();

        assert!(matches!(
            exec.rollback(&event.action.id).await,
            Err(ExecutorError::NotReversible("restart_service"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_unknown_action() {
        let execution = Arc::new(NoOpExecution::new());
        let (exec, _events, _) = executor(execution, probe_with_record());

        assert!(matches!(
            exec.rollback(&ActionId::generate()).await,
            Err(ExecutorError::UnknownAction(_))
        ));
    }
}
