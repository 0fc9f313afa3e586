//! MEND Executor - Applies approved remediation actions
//!
//! The executor owns the Approved -> Executing -> (Succeeded | Failed)
//! leg of the action lifecycle. Each dispatch runs as its own task:
//! pre-state snapshot, provider call with timeout and a single retry on
//! transient failure, success stamping, settle delay, post-state capture.
//! Completion events flow back to the control loop over a channel; the
//! executor never touches the ledger directly.
//!
//! Provider calls go through the [`ActionExecution`] trait. Production
//! wires cloud/database adapters; tests use the deterministic doubles in
//! [`testing`].

#![deny(unsafe_code)]

pub mod error;
pub mod execution;
pub mod executor;
pub mod testing;

pub use error::{ExecutionError, ExecutorError, ExecutorResult};
pub use execution::ActionExecution;
pub use executor::{ActionExecutor, CompletionEvent, ExecutorConfig};
