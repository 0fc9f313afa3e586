//! Shared safety-limit state for one domain
//!
//! Cooldown stamps, trailing-hour spend commitments, execution
//! timestamps, and the in-flight set are owned by a single control-loop
//! domain. One mutex protects them from concurrent action-completion
//! callbacks; there is no cross-domain state.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mend_types::{RemediationAction, ServiceId};
use parking_lot::Mutex;

/// Trailing window for spend and rate accounting
fn trailing_window() -> chrono::Duration {
    chrono::Duration::minutes(60)
}

#[derive(Debug, Default)]
struct LimitsState {
    /// Last successful execution per (target, kind label)
    cooldowns: HashMap<(ServiceId, &'static str), DateTime<Utc>>,

    /// Spend commitments (signed) recorded at authorization time
    spend: Vec<(DateTime<Utc>, f64)>,

    /// Execution timestamps recorded at authorization time
    executions: Vec<DateTime<Utc>>,

    /// Actions currently executing, keyed by (target, kind label)
    in_flight: HashSet<(ServiceId, &'static str)>,

    /// Would-be actions recorded while in dry-run mode
    dry_run_log: Vec<RemediationAction>,
}

impl LimitsState {
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - trailing_window();
        self.spend.retain(|(at, _)| *at >= cutoff);
        self.executions.retain(|at| *at >= cutoff);
    }
}

/// Per-domain cooldown/budget/rate bookkeeping
#[derive(Debug, Default)]
pub struct SafetyLimits {
    inner: Mutex<LimitsState>,
}

impl SafetyLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed spend over the trailing hour.
    pub fn committed_spend(&self, now: DateTime<Utc>) -> f64 {
        let mut state = self.inner.lock();
        state.prune(now);
        state.spend.iter().map(|(_, cost)| cost).sum()
    }

    /// Actions authorized for execution in the trailing hour.
    pub fn executions_in_window(&self, now: DateTime<Utc>) -> u32 {
        let mut state = self.inner.lock();
        state.prune(now);
        state.executions.len() as u32
    }

    /// Record an authorized action's spend commitment and execution slot.
    ///
    /// Done at authorization time so two same-tick candidates cannot both
    /// slip under the budget or rate caps.
    pub fn record_authorization(&self, cost_impact: f64, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        state.prune(now);
        state.spend.push((now, cost_impact));
        state.executions.push(now);
    }

    /// Time remaining before the cooldown for (target, kind) expires.
    pub fn cooldown_remaining(
        &self,
        service_id: &ServiceId,
        kind_label: &'static str,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let state = self.inner.lock();
        let last = state
            .cooldowns
            .get(&(service_id.clone(), kind_label))
            .copied()?;
        let cooldown = chrono::Duration::from_std(cooldown).ok()?;
        let elapsed = now - last;
        if elapsed < cooldown {
            (cooldown - elapsed).to_std().ok()
        } else {
            None
        }
    }

    /// Stamp the last-execution time after a successful action.
    pub fn record_success(
        &self,
        service_id: &ServiceId,
        kind_label: &'static str,
        now: DateTime<Utc>,
    ) {
        let mut state = self.inner.lock();
        state
            .cooldowns
            .insert((service_id.clone(), kind_label), now);
    }

    /// Claim the in-flight slot for (target, kind).
    ///
    /// Returns false when an action of the same kind on the same target
    /// is already executing.
    pub fn try_begin_execution(&self, service_id: &ServiceId, kind_label: &'static str) -> bool {
        let mut state = self.inner.lock();
        state.in_flight.insert((service_id.clone(), kind_label))
    }

    /// Release the in-flight slot once execution completed.
    pub fn end_execution(&self, service_id: &ServiceId, kind_label: &'static str) {
        let mut state = self.inner.lock();
        state.in_flight.remove(&(service_id.clone(), kind_label));
    }

    /// Record a would-be action while dry-run is enabled.
    pub fn record_dry_run(&self, action: RemediationAction) {
        self.inner.lock().dry_run_log.push(action);
    }

    /// Actions recorded in dry-run mode.
    pub fn dry_run_log(&self) -> Vec<RemediationAction> {
        self.inner.lock().dry_run_log.clone()
    }
}
