//! Safety gate
//!
//! Every candidate action passes the checks in a fixed order: dry-run,
//! cooldown, budget, confirmation, rate limit. The first failing check
//! wins and its reason is what the block counters and notifications
//! carry, so the order is part of the observable contract.
//!
//! Authorization commits the spend and execution slot immediately, under
//! the limits lock, so two candidates gated in the same tick cannot both
//! slip under a cap.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mend_types::{ActionStatus, PolicyConfig, RemediationAction, TransitionError};
use tracing::{debug, info};

use crate::limits::SafetyLimits;

/// Why the gate refused an action
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    /// Dry-run mode blocks everything
    DryRun,

    /// A recent execution of the same kind on the same target
    Cooldown { remaining: Duration },

    /// Authorizing would push committed spend past the hourly cap
    Budget { projected: f64, cap: f64 },

    /// The action needs explicit approval that has not been given
    ConfirmationRequired,

    /// The trailing-hour execution cap is exhausted
    RateLimit { count: u32, max: u32 },
}

impl BlockReason {
    /// Stable label for metrics and audit records
    pub fn as_label(&self) -> &'static str {
        match self {
            BlockReason::DryRun => "dry_run",
            BlockReason::Cooldown { .. } => "cooldown",
            BlockReason::Budget { .. } => "budget",
            BlockReason::ConfirmationRequired => "confirmation_required",
            BlockReason::RateLimit { .. } => "rate_limit",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DryRun => write!(f, "dry-run mode is enabled"),
            BlockReason::Cooldown { remaining } => {
                write!(f, "cooldown active for another {}s", remaining.as_secs())
            }
            BlockReason::Budget { projected, cap } => {
                write!(f, "projected hourly spend {projected:.2} exceeds cap {cap:.2}")
            }
            BlockReason::ConfirmationRequired => write!(f, "explicit confirmation required"),
            BlockReason::RateLimit { count, max } => {
                write!(f, "{count} of {max} hourly executions already used")
            }
        }
    }
}

/// Outcome of gating one action
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Authorized,
    Blocked(BlockReason),
}

impl GateDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GateDecision::Authorized)
    }
}

/// Applies the ordered safety checks to candidate actions
pub struct SafetyGate {
    config: PolicyConfig,
}

impl SafetyGate {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Gate one pending action, advancing its status to Approved or
    /// Blocked.
    ///
    /// Returns [`TransitionError`] only when the action was not Pending,
    /// which indicates an ordering bug in the caller.
    pub fn authorize(
        &self,
        action: &mut RemediationAction,
        limits: &SafetyLimits,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, TransitionError> {
        if let Some(reason) = self.check(action, limits, now) {
            if reason == BlockReason::DryRun {
                limits.record_dry_run(action.clone());
            }
            debug!(
                action_id = %action.id,
                kind = action.kind.label(),
                reason = reason.as_label(),
                "Action blocked by safety gate"
            );
            action.transition(ActionStatus::Blocked)?;
            return Ok(GateDecision::Blocked(reason));
        }

        // Commit spend and the execution slot before anything can race us
        limits.record_authorization(action.estimated_cost_impact, now);
        action.transition(ActionStatus::Approved)?;
        info!(
            action_id = %action.id,
            kind = action.kind.label(),
            service_id = %action.service_id,
            cost_impact = action.estimated_cost_impact,
            "Action authorized"
        );
        Ok(GateDecision::Authorized)
    }

    /// First failing check, in the fixed order.
    fn check(
        &self,
        action: &RemediationAction,
        limits: &SafetyLimits,
        now: DateTime<Utc>,
    ) -> Option<BlockReason> {
        if self.config.dry_run {
            return Some(BlockReason::DryRun);
        }

        let cooldown = self.config.cooldown_for(action.kind.label());
        if let Some(remaining) =
            limits.cooldown_remaining(&action.service_id, action.kind.label(), cooldown, now)
        {
            return Some(BlockReason::Cooldown { remaining });
        }

        let projected = limits.committed_spend(now) + action.estimated_cost_impact;
        if projected > self.config.max_hourly_spend {
            return Some(BlockReason::Budget {
                projected,
                cap: self.config.max_hourly_spend,
            });
        }

        if action.requires_confirmation {
            return Some(BlockReason::ConfirmationRequired);
        }

        let count = limits.executions_in_window(now);
        if count >= self.config.max_actions_per_hour {
            return Some(BlockReason::RateLimit {
                count,
                max: self.config.max_actions_per_hour,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mend_types::{ActionKind, RiskTier, ServiceId};

    fn action(kind: ActionKind, cost: f64) -> RemediationAction {
        RemediationAction::new(kind, ServiceId::new("gpu-1"), "test", cost, RiskTier::Medium)
    }

    fn gate(configure: impl FnOnce(&mut PolicyConfig)) -> SafetyGate {
        let mut config = PolicyConfig::default();
        configure(&mut config);
        SafetyGate::new(config)
    }

    #[test]
    fn test_clean_action_authorized_and_recorded() {
        let gate = gate(|_| {});
        let limits = SafetyLimits::new();
        let now = Utc::now();
        let mut a = action(ActionKind::ProvisionInstance, 2.5);

        let decision = gate.authorize(&mut a, &limits, now).unwrap();
        assert!(decision.is_authorized());
        assert_eq!(a.status, ActionStatus::Approved);
        assert!((limits.committed_spend(now) - 2.5).abs() < 1e-9);
        assert_eq!(limits.executions_in_window(now), 1);
    }

    #[test]
    fn test_dry_run_blocks_everything_and_logs() {
        let gate = gate(|c| c.dry_run = true);
        let limits = SafetyLimits::new();
        let now = Utc::now();
        let mut a = action(ActionKind::RestartService, 0.0);

        let decision = gate.authorize(&mut a, &limits, now).unwrap();
        assert_eq!(decision, GateDecision::Blocked(BlockReason::DryRun));
        assert_eq!(a.status, ActionStatus::Blocked);
        assert_eq!(limits.dry_run_log().len(), 1);
        // Nothing committed
        assert_eq!(limits.executions_in_window(now), 0);
    }

    #[test]
    fn test_dry_run_reported_before_cooldown() {
        let gate = gate(|c| c.dry_run = true);
        let limits = SafetyLimits::new();
        let now = Utc::now();
        // Cooldown would also fire, but dry-run is checked first
        limits.record_success(&ServiceId::new("gpu-1"), "restart_service", now);
        let mut a = action(ActionKind::RestartService, 0.0);

        let decision = gate.authorize(&mut a, &limits, now).unwrap();
        assert_eq!(decision, GateDecision::Blocked(BlockReason::DryRun));
    }

    #[test]
    fn test_cooldown_blocks_until_expiry() {
        let gate = gate(|c| c.default_cooldown_minutes = 30);
        let limits = SafetyLimits::new();
        let now = Utc::now();
        limits.record_success(&ServiceId::new("gpu-1"), "restart_service", now);

        let mut a = action(ActionKind::RestartService, 0.0);
        let decision = gate
            .authorize(&mut a, &limits, now + chrono::Duration::minutes(29))
            .unwrap();
        assert!(matches!(
            decision,
            GateDecision::Blocked(BlockReason::Cooldown { .. })
        ));

        let mut b = action(ActionKind::RestartService, 0.0);
        let decision = gate
            .authorize(&mut b, &limits, now + chrono::Duration::minutes(31))
            .unwrap();
        assert!(decision.is_authorized());
    }

    #[test]
    fn test_cooldown_is_per_target_and_kind() {
        let gate = gate(|_| {});
        let limits = SafetyLimits::new();
        let now = Utc::now();
        limits.record_success(&ServiceId::new("gpu-1"), "restart_service", now);

        // Same kind, different target
        let mut other = RemediationAction::new(
            ActionKind::RestartService,
            ServiceId::new("gpu-2"),
            "test",
            0.0,
            RiskTier::Medium,
        );
        assert!(gate.authorize(&mut other, &limits, now).unwrap().is_authorized());

        // Same target, different kind
        let mut kill = action(ActionKind::KillQueries, 0.0);
        assert!(gate.authorize(&mut kill, &limits, now).unwrap().is_authorized());
    }

    #[test]
    fn test_budget_counts_same_tick_commitments() {
        let gate = gate(|c| c.max_hourly_spend = 4.0);
        let limits = SafetyLimits::new();
        let now = Utc::now();

        let mut first = action(ActionKind::ProvisionInstance, 2.5);
        assert!(gate.authorize(&mut first, &limits, now).unwrap().is_authorized());

        // Second candidate in the same tick sees the first commitment
        let mut second = action(ActionKind::ProvisionInstance, 2.5);
        let decision = gate.authorize(&mut second, &limits, now).unwrap();
        assert!(matches!(
            decision,
            GateDecision::Blocked(BlockReason::Budget { .. })
        ));
    }

    #[test]
    fn test_negative_cost_passes_budget() {
        let gate = gate(|c| c.max_hourly_spend = 0.0);
        let limits = SafetyLimits::new();
        let now = Utc::now();

        let mut a = action(ActionKind::TerminateInstance { instance: None }, -2.5);
        assert!(gate.authorize(&mut a, &limits, now).unwrap().is_authorized());
    }

    #[test]
    fn test_confirmation_required_blocks() {
        let gate = gate(|_| {});
        let limits = SafetyLimits::new();
        let mut a = action(ActionKind::ProvisionInstance, 2.5).with_confirmation(true);

        let decision = gate.authorize(&mut a, &limits, Utc::now()).unwrap();
        assert_eq!(
            decision,
            GateDecision::Blocked(BlockReason::ConfirmationRequired)
        );
    }

    #[test]
    fn test_rate_limit_blocks_after_cap() {
        let gate = gate(|c| {
            c.max_actions_per_hour = 2;
            c.default_cooldown_minutes = 0;
        });
        let limits = SafetyLimits::new();
        let now = Utc::now();

        for _ in 0..2 {
            let mut a = action(ActionKind::OptimizeStore, 0.0);
            assert!(gate.authorize(&mut a, &limits, now).unwrap().is_authorized());
        }
        let mut third = action(ActionKind::OptimizeStore, 0.0);
        let decision = gate.authorize(&mut third, &limits, now).unwrap();
        assert_eq!(
            decision,
            GateDecision::Blocked(BlockReason::RateLimit { count: 2, max: 2 })
        );

        // The window slides: an hour later the cap has room again
        let later = now + chrono::Duration::minutes(61);
        let mut fourth = action(ActionKind::OptimizeStore, 0.0);
        assert!(gate.authorize(&mut fourth, &limits, later).unwrap().is_authorized());
    }

    proptest::proptest! {
        // However the costs arrive, committed positive spend never
        // exceeds the hourly cap.
        #[test]
        fn prop_committed_spend_never_exceeds_cap(costs in proptest::collection::vec(0.0f64..20.0, 1..30)) {
            let gate = gate(|c| {
                c.max_hourly_spend = 25.0;
                c.default_cooldown_minutes = 0;
                c.max_actions_per_hour = 100;
                c.confirmation_cost_threshold = f64::MAX;
            });
            let limits = SafetyLimits::new();
            let now = Utc::now();

            for cost in costs {
                let mut a = action(ActionKind::ProvisionInstance, cost);
                gate.authorize(&mut a, &limits, now).unwrap();
                proptest::prop_assert!(limits.committed_spend(now) <= 25.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_non_pending_action_is_rejected() {
        let gate = gate(|_| {});
        let limits = SafetyLimits::new();
        let mut a = action(ActionKind::RestartService, 0.0);
        a.transition(ActionStatus::Approved).unwrap();

        assert!(gate.authorize(&mut a, &limits, Utc::now()).is_err());
    }
}
