//! Effectiveness scoring derived from the audit ledger
//!
//! The ledger updates these incrementally; the policy engine reads them as
//! an immutable snapshot. Policy never writes back.

use serde::{Deserialize, Serialize};

/// Moving aggregate of outcomes for one action kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessScore {
    pub success_count: u64,
    pub failure_count: u64,
    pub average_cost_impact: f64,
}

impl EffectivenessScore {
    /// Total executed actions of this kind.
    pub fn total(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Proportion of successes; `None` until at least one outcome exists.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            None
        } else {
            Some(self.success_count as f64 / total as f64)
        }
    }

    /// Fold one outcome into the aggregate.
    pub fn record(&mut self, success: bool, cost_impact: f64) {
        let prior_total = self.total() as f64;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        // Incremental mean over all observed outcomes
        self.average_cost_impact =
            (self.average_cost_impact * prior_total + cost_impact) / (prior_total + 1.0);
    }
}
