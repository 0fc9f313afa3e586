//! Remediation actions and their lifecycle
//!
//! An action's status is a strict state machine:
//!
//! ```text
//! Pending -> (Blocked | Approved) -> Executing -> (Succeeded | Failed) -> [RolledBack]
//! ```
//!
//! No transition may skip a state. Blocked is terminal for the tick that
//! produced the action; blocked actions are not retried automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ActionId, ServiceId};

/// Kind of remediation action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Restart the service process/workload
    RestartService,

    /// Provision an additional instance into a fleet
    ProvisionInstance,

    /// Terminate an underutilized instance
    TerminateInstance {
        /// Instance to terminate, when the probe identified one
        instance: Option<String>,
    },

    /// Scale a fleet up by a fixed delta
    ScaleUp {
        delta: u32,
    },

    /// Kill long-running or blocking queries
    KillQueries,

    /// Compact/optimize a storage or cache backend
    OptimizeStore,
}

impl ActionKind {
    /// Stable label used for cooldown keys, metrics, and effectiveness
    /// aggregation. Kind payloads do not participate.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::RestartService => "restart_service",
            ActionKind::ProvisionInstance => "provision_instance",
            ActionKind::TerminateInstance { .. } => "terminate_instance",
            ActionKind::ScaleUp { .. } => "scale_up",
            ActionKind::KillQueries => "kill_queries",
            ActionKind::OptimizeStore => "optimize_store",
        }
    }

    /// Whether the provider can undo this action after it succeeded.
    ///
    /// Irreversible kinds skip pre-state rollback requirements but can
    /// never be rolled back.
    pub fn is_reversible(&self) -> bool {
        match self {
            // A provisioned instance can be terminated again; a scale-up
            // can be scaled back down.
            ActionKind::ProvisionInstance | ActionKind::ScaleUp { .. } => true,
            ActionKind::RestartService
            | ActionKind::TerminateInstance { .. }
            | ActionKind::KillQueries
            | ActionKind::OptimizeStore => false,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Risk classification assigned by the policy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Action lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Proposed, not yet gated
    Pending,
    /// Rejected by the safety gate; terminal for this tick
    Blocked,
    /// Passed the safety gate, awaiting dispatch
    Approved,
    /// Provider call in flight
    Executing,
    /// Provider call succeeded
    Succeeded,
    /// Provider call failed
    Failed,
    /// Succeeded action was rolled back
    RolledBack,
}

impl ActionStatus {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (Pending, Blocked)
                | (Pending, Approved)
                | (Approved, Executing)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Succeeded, RolledBack)
        )
    }

    /// Terminal states accept no further transitions except
    /// Succeeded -> RolledBack.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Blocked | ActionStatus::Failed | ActionStatus::RolledBack
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Blocked => "blocked",
            ActionStatus::Approved => "approved",
            ActionStatus::Executing => "executing",
            ActionStatus::Succeeded => "succeeded",
            ActionStatus::Failed => "failed",
            ActionStatus::RolledBack => "rolled_back",
        };
        write!(f, "{s}")
    }
}

/// Attempted illegal status transition
///
/// This is a programming/ordering error. It is fatal to the single action
/// involved and must never abort the loop or affect other actions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid action status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ActionStatus,
    pub to: ActionStatus,
}

/// A candidate or in-flight remediation action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationAction {
    /// Unique action identifier
    pub id: ActionId,

    /// What to do
    pub kind: ActionKind,

    /// Target service
    pub service_id: ServiceId,

    /// Human-readable reason (derived from the triggering anomaly)
    pub reason: String,

    /// Estimated hourly cost impact; negative values are savings
    pub estimated_cost_impact: f64,

    /// Risk classification
    pub risk_tier: RiskTier,

    /// Whether the action needs explicit approval before execution
    pub requires_confirmation: bool,

    /// Current lifecycle status
    pub status: ActionStatus,

    /// When the action was proposed
    pub created_at: DateTime<Utc>,
}

impl RemediationAction {
    pub fn new(
        kind: ActionKind,
        service_id: ServiceId,
        reason: impl Into<String>,
        estimated_cost_impact: f64,
        risk_tier: RiskTier,
    ) -> Self {
        Self {
            id: ActionId::generate(),
            kind,
            service_id,
            reason: reason.into(),
            estimated_cost_impact,
            risk_tier,
            requires_confirmation: false,
            status: ActionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Builder-style confirmation flag
    pub fn with_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    /// Advance the status, rejecting illegal transitions.
    pub fn transition(&mut self, next: ActionStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
