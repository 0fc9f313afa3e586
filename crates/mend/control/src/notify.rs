//! Operator notifications
//!
//! The loop reports safety blocks, action failures, and escalations
//! through a [`NotificationSink`]; production wires a pager or chat
//! adapter, tests capture messages in memory. The details map carries
//! the structured fields an adapter would render (action id, reason,
//! error) so the message stays human-readable.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Structured context attached to a notification
pub type NotifyDetails = BTreeMap<String, String>;

/// Notification urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Outbound operator notification capability
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, severity: Severity, message: &str, details: &NotifyDetails);
}

/// Sink that writes notifications to the log
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, severity: Severity, message: &str, details: &NotifyDetails) {
        match severity {
            Severity::Info => info!(target: "mend::notify", ?details, "{message}"),
            Severity::Warning => warn!(target: "mend::notify", ?details, "{message}"),
            Severity::Critical => error!(target: "mend::notify", ?details, "{message}"),
        }
    }
}

/// Sink that records notifications for assertions
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(Severity, String, NotifyDetails)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String, NotifyDetails)> {
        self.messages.lock().clone()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|(s, _, _)| *s == severity)
            .count()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, severity: Severity, message: &str, details: &NotifyDetails) {
        self.messages
            .lock()
            .push((severity, message.to_string(), details.clone()));
    }
}
