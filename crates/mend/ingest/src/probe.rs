//! Health probe capability
//!
//! A [`HealthProbe`] is the external adapter that knows how to pull a
//! health snapshot for a given service (GPU API client, DB client, ...).
//! The engine only depends on this trait; tests use deterministic fakes.

use async_trait::async_trait;
use mend_types::{ServiceHealthRecord, ServiceId, ServiceType};
use serde::{Deserialize, Serialize};

use crate::error::IngestResult;

/// A registered monitored service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_id: ServiceId,
    pub service_type: ServiceType,
}

impl ServiceDescriptor {
    pub fn new(service_id: impl Into<String>, service_type: ServiceType) -> Self {
        Self {
            service_id: ServiceId::new(service_id),
            service_type,
        }
    }
}

/// External health-probing capability, implemented per service type.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Pull the current health snapshot for one service.
    async fn probe(&self, service_id: &ServiceId) -> IngestResult<ServiceHealthRecord>;
}

/// Probe returning pre-seeded records; for wiring and tests.
#[derive(Default)]
pub struct StaticProbe {
    records: dashmap::DashMap<ServiceId, ServiceHealthRecord>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record returned for a service.
    pub fn set(&self, record: ServiceHealthRecord) {
        self.records.insert(record.service_id.clone(), record);
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn probe(&self, service_id: &ServiceId) -> IngestResult<ServiceHealthRecord> {
        self.records
            .get(service_id)
            .map(|r| r.clone())
            .ok_or_else(|| crate::error::IngestError::ProbeUnavailable {
                service_id: service_id.clone(),
                reason: "no record seeded".to_string(),
            })
    }
}
