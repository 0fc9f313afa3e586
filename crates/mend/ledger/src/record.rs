//! Audit records and query filters

use chrono::{DateTime, Utc};
use mend_types::{ActionOutcome, ActionStatus, RemediationAction, ServiceId};
use serde::{Deserialize, Serialize};

/// One executed action and what came of it
///
/// Only actions that reached the executor are audited; gate blocks are
/// counted and notified but never land here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The action in its terminal status
    pub action: RemediationAction,

    /// Execution outcome
    pub outcome: ActionOutcome,

    /// When the record was written
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn executed(
        action: RemediationAction,
        outcome: ActionOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            outcome,
            recorded_at,
        }
    }
}

/// Conjunctive filter over audit records
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub service_id: Option<ServiceId>,
    pub kind_label: Option<&'static str>,
    pub status: Option<ActionStatus>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn for_service(service_id: ServiceId) -> Self {
        Self {
            service_id: Some(service_id),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind_label: &'static str) -> Self {
        self.kind_label = Some(kind_label);
        self
    }

    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(service_id) = &self.service_id {
            if record.action.service_id != *service_id {
                return false;
            }
        }
        if let Some(kind_label) = self.kind_label {
            if record.action.kind.label() != kind_label {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.action.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.recorded_at < since {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mend_types::{ActionKind, RiskTier};

    fn record(service: &str, kind: ActionKind) -> AuditRecord {
        let mut action = RemediationAction::new(
            kind,
            ServiceId::new(service),
            "test",
            0.0,
            RiskTier::Low,
        );
        action.status = ActionStatus::Succeeded;
        let now = Utc::now();
        let outcome = ActionOutcome::success(
            action.id.clone(),
            action.kind.clone(),
            action.service_id.clone(),
            0.0,
            action.created_at,
            now,
        );
        AuditRecord::executed(action, outcome, now)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(AuditFilter::default().matches(&record("a", ActionKind::RestartService)));
    }

    #[test]
    fn test_filter_fields_are_conjunctive() {
        let rec = record("gpu-1", ActionKind::ProvisionInstance);

        let filter = AuditFilter::for_service(ServiceId::new("gpu-1"))
            .with_kind("provision_instance")
            .with_status(ActionStatus::Succeeded);
        assert!(filter.matches(&rec));

        let filter = AuditFilter::for_service(ServiceId::new("gpu-1")).with_kind("restart_service");
        assert!(!filter.matches(&rec));

        let filter = AuditFilter::default().since(Utc::now() + chrono::Duration::minutes(1));
        assert!(!filter.matches(&rec));
    }
}
