//! Control-loop error types

use mend_executor::ExecutorError;
use mend_ledger::LedgerError;
use mend_types::TransitionError;
use thiserror::Error;

/// Phase-level failure inside one tick
///
/// These are contained: the failing item or phase is skipped and the
/// tick continues.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type ControlResult<T> = Result<T, ControlError>;
