//! Deterministic execution doubles
//!
//! Used by the executor's own tests and by control-loop integration
//! tests. None of these touch real infrastructure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mend_types::RemediationAction;
use parking_lot::Mutex;

use crate::error::ExecutionError;
use crate::execution::ActionExecution;

/// Succeeds instantly, counting calls
#[derive(Default)]
pub struct NoOpExecution {
    applied: AtomicUsize,
    rolled_back: AtomicUsize,
}

impl NoOpExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    pub fn rolled_back(&self) -> usize {
        self.rolled_back.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecution for NoOpExecution {
    async fn apply(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails with a fixed error
pub struct FailingExecution {
    error: ExecutionError,
    attempts: AtomicUsize,
}

impl FailingExecution {
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            error: ExecutionError::Permanent(reason.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            error: ExecutionError::Transient(reason.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecution for FailingExecution {
    async fn apply(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn rollback(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        Err(self.error.clone())
    }
}

/// Fails transiently N times, then succeeds
pub struct FlakyExecution {
    remaining_failures: Mutex<usize>,
    attempts: AtomicUsize,
}

impl FlakyExecution {
    pub fn failing_times(failures: usize) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecution for FlakyExecution {
    async fn apply(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.remaining_failures.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ExecutionError::Transient("injected flake".into()));
        }
        Ok(())
    }

    async fn rollback(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Never completes within any reasonable timeout
pub struct HangingExecution;

#[async_trait]
impl ActionExecution for HangingExecution {
    async fn apply(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        Ok(())
    }

    async fn rollback(&self, _action: &RemediationAction) -> Result<(), ExecutionError> {
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        Ok(())
    }
}
