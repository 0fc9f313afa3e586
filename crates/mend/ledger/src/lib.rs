//! MEND Ledger - Append-only audit trail for remediation actions
//!
//! Every executed action lands here exactly once with its outcome; gate
//! blocks are surfaced through metrics and notifications instead.
//! Records are idempotent by action ID, so a crash between execution and
//! audit cannot double-count an outcome. The ledger is also the source of
//! the per-kind effectiveness scores the policy engine reads.
//!
//! Two implementations: [`MemoryAuditLedger`] for tests and ephemeral
//! runs, [`FileAuditLedger`] for durable JSONL persistence with full
//! reload on open.

#![deny(unsafe_code)]

pub mod error;
pub mod file;
pub mod ledger;
pub mod memory;
pub mod record;

pub use error::{LedgerError, LedgerResult};
pub use file::FileAuditLedger;
pub use ledger::AuditLedger;
pub use memory::MemoryAuditLedger;
pub use record::{AuditFilter, AuditRecord};
