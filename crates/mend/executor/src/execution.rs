//! Provider execution capability

use async_trait::async_trait;
use mend_types::RemediationAction;

use crate::error::ExecutionError;

/// The adapter that performs real infrastructure changes.
///
/// Implementations decide how each [`ActionKind`](mend_types::ActionKind)
/// maps onto provider calls. They must be cancellation-safe: the executor
/// wraps `apply` in a timeout and may drop the future mid-flight.
#[async_trait]
pub trait ActionExecution: Send + Sync {
    /// Apply the action against the provider.
    async fn apply(&self, action: &RemediationAction) -> Result<(), ExecutionError>;

    /// Undo a previously applied action.
    ///
    /// Only called for reversible kinds that reached Succeeded.
    async fn rollback(&self, action: &RemediationAction) -> Result<(), ExecutionError>;
}
