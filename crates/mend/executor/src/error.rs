//! Executor error types

use mend_types::{ActionId, ActionStatus, TransitionError};
use thiserror::Error;

/// Provider-level execution failure
///
/// Transient failures get exactly one retry; permanent failures do not.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

/// Dispatch- and rollback-level failures
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("unknown action: {0}")]
    UnknownAction(ActionId),

    #[error("action {action_id} is {status}, expected a rollback-eligible state")]
    NotRollbackEligible {
        action_id: ActionId,
        status: ActionStatus,
    },

    #[error("action kind '{0}' is not reversible")]
    NotReversible(&'static str),

    #[error("an action of the same kind is already in flight for this service")]
    AlreadyInFlight,

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("rollback failed: {0}")]
    RollbackFailed(#[source] ExecutionError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
