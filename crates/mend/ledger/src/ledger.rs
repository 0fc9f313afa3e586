//! The audit ledger trait

use std::collections::HashMap;

use async_trait::async_trait;
use mend_types::EffectivenessScore;

use crate::error::LedgerResult;
use crate::record::{AuditFilter, AuditRecord};

/// Append-only store of audited actions
///
/// `record` is idempotent by action ID: re-recording an already-seen
/// action is a no-op that returns `false`, so retries after a crash
/// cannot inflate effectiveness counts.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Append one record. Returns `true` when the record was new.
    async fn record(&self, record: AuditRecord) -> LedgerResult<bool>;

    /// Records matching the filter, oldest first.
    async fn query(&self, filter: &AuditFilter) -> LedgerResult<Vec<AuditRecord>>;

    /// Per-kind effectiveness snapshot derived from executed outcomes.
    ///
    /// Blocked actions do not contribute. The returned map is a copy;
    /// callers never hold a lock into the ledger.
    async fn effectiveness(&self) -> LedgerResult<HashMap<String, EffectivenessScore>>;
}
