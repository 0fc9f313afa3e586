//! In-memory audit ledger

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use mend_types::{ActionId, EffectivenessScore};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::LedgerResult;
use crate::ledger::AuditLedger;
use crate::record::{AuditFilter, AuditRecord};

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    records: Vec<AuditRecord>,
    seen: HashSet<ActionId>,
    pub(crate) effectiveness: HashMap<String, EffectivenessScore>,
}

impl MemoryState {
    /// Shared append path for the memory and file ledgers.
    pub(crate) fn append(&mut self, record: AuditRecord) -> bool {
        if !self.seen.insert(record.action.id.clone()) {
            debug!(action_id = %record.action.id, "Duplicate audit record ignored");
            return false;
        }
        self.effectiveness
            .entry(record.action.kind.label().to_string())
            .or_default()
            .record(record.outcome.outcome.is_success(), record.outcome.cost_impact);
        self.records.push(record);
        true
    }

    pub(crate) fn query(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }
}

/// Ledger backed by process memory, for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryAuditLedger {
    state: Mutex<MemoryState>,
}

impl MemoryAuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records held, duplicates excluded.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditLedger for MemoryAuditLedger {
    async fn record(&self, record: AuditRecord) -> LedgerResult<bool> {
        Ok(self.state.lock().append(record))
    }

    async fn query(&self, filter: &AuditFilter) -> LedgerResult<Vec<AuditRecord>> {
        Ok(self.state.lock().query(filter))
    }

    async fn effectiveness(&self) -> LedgerResult<HashMap<String, EffectivenessScore>> {
        Ok(self.state.lock().effectiveness.clone())
    }
}

pub(crate) use MemoryState as LedgerState;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mend_types::{
        ActionKind, ActionOutcome, ActionStatus, RemediationAction, RiskTier, ServiceId,
    };

    fn executed(success: bool) -> AuditRecord {
        let mut action = RemediationAction::new(
            ActionKind::RestartService,
            ServiceId::new("db-1"),
            "test",
            0.0,
            RiskTier::Medium,
        );
        action.status = if success {
            ActionStatus::Succeeded
        } else {
            ActionStatus::Failed
        };
        let now = Utc::now();
        let outcome = if success {
            ActionOutcome::success(
                action.id.clone(),
                action.kind.clone(),
                action.service_id.clone(),
                0.0,
                action.created_at,
                now,
            )
        } else {
            ActionOutcome::failure(
                action.id.clone(),
                action.kind.clone(),
                action.service_id.clone(),
                0.0,
                action.created_at,
                now,
                "provider timeout",
            )
        };
        AuditRecord::executed(action, outcome, now)
    }

    #[tokio::test]
    async fn test_record_is_idempotent_by_action_id() {
        let ledger = MemoryAuditLedger::new();
        let record = executed(true);

        assert!(ledger.record(record.clone()).await.unwrap());
        assert!(!ledger.record(record).await.unwrap());
        assert_eq!(ledger.len(), 1);

        // The duplicate did not double-count effectiveness
        let scores = ledger.effectiveness().await.unwrap();
        assert_eq!(scores.get("restart_service").unwrap().total(), 1);
    }

    #[tokio::test]
    async fn test_effectiveness_tracks_successes_and_failures() {
        let ledger = MemoryAuditLedger::new();
        ledger.record(executed(true)).await.unwrap();
        ledger.record(executed(true)).await.unwrap();
        ledger.record(executed(false)).await.unwrap();

        let scores = ledger.effectiveness().await.unwrap();
        let score = scores.get("restart_service").unwrap();
        assert_eq!(score.success_count, 2);
        assert_eq!(score.failure_count, 1);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let ledger = MemoryAuditLedger::new();
        ledger.record(executed(true)).await.unwrap();
        ledger.record(executed(false)).await.unwrap();

        let succeeded = ledger
            .query(&AuditFilter::default().with_status(ActionStatus::Succeeded))
            .await
            .unwrap();
        assert_eq!(succeeded.len(), 1);

        let other = ledger
            .query(&AuditFilter::for_service(ServiceId::new("db-2")))
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
