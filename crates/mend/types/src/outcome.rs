//! Executed-action outcomes for the audit ledger
//!
//! Outcomes are append-only: once written to the ledger they are never
//! mutated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::ids::{ActionId, ServiceId};

/// Terminal result of an executed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    Failure {
        /// Provider error captured at failure time
        error: String,
    },
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Success)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure { .. } => "failure",
        }
    }
}

/// Audit record for one executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Action this outcome belongs to
    pub action_id: ActionId,

    /// Kind of the executed action
    pub kind: ActionKind,

    /// Target service
    pub service_id: ServiceId,

    /// Metrics captured before execution (rollback snapshot)
    pub metrics_before: BTreeMap<String, f64>,

    /// Metrics captured after the settle delay; empty for failures
    pub metrics_after: BTreeMap<String, f64>,

    /// Terminal result
    pub outcome: OutcomeKind,

    /// Estimated hourly cost impact carried from the action
    pub cost_impact: f64,

    /// When the action was proposed
    pub created_at: DateTime<Utc>,

    /// When execution completed
    pub executed_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn success(
        action_id: ActionId,
        kind: ActionKind,
        service_id: ServiceId,
        cost_impact: f64,
        created_at: DateTime<Utc>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action_id,
            kind,
            service_id,
            metrics_before: BTreeMap::new(),
            metrics_after: BTreeMap::new(),
            outcome: OutcomeKind::Success,
            cost_impact,
            created_at,
            executed_at,
        }
    }

    pub fn failure(
        action_id: ActionId,
        kind: ActionKind,
        service_id: ServiceId,
        cost_impact: f64,
        created_at: DateTime<Utc>,
        executed_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            action_id,
            kind,
            service_id,
            metrics_before: BTreeMap::new(),
            metrics_after: BTreeMap::new(),
            outcome: OutcomeKind::Failure {
                error: error.into(),
            },
            cost_impact,
            created_at,
            executed_at,
        }
    }

    pub fn with_metrics_before(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics_before = metrics;
        self
    }

    pub fn with_metrics_after(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics_after = metrics;
        self
    }
}
