//! Health records and metric samples
//!
//! A ServiceHealthRecord is the normalized per-tick snapshot of one
//! monitored service. MetricSamples are the immutable time-series points
//! derived from its numeric fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ServiceId;

/// Kind of monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    /// GPU fleet (provisioning/termination targets)
    GpuFleet,
    /// Relational or document database
    Database,
    /// In-memory cache
    Cache,
    /// Container workload
    Container,
    /// Network path or load balancer
    Network,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceType::GpuFleet => "gpu_fleet",
            ServiceType::Database => "database",
            ServiceType::Cache => "cache",
            ServiceType::Container => "container",
            ServiceType::Network => "network",
        };
        write!(f, "{s}")
    }
}

/// Coarse health classification reported by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Critical status is pre-classified and bypasses sustain timers.
    pub fn is_critical(&self) -> bool {
        matches!(self, HealthStatus::Critical)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// One immutable time-series point for a service metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub service_id: ServiceId,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        service_id: ServiceId,
        metric: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            service_id,
            metric: metric.into(),
            value,
            timestamp,
        }
    }
}

/// Per-tick health snapshot of one monitored service
///
/// Overwritten on every successful probe. When a probe times out the
/// previous record is retained as stale rather than discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthRecord {
    /// Service this record describes
    pub service_id: ServiceId,

    /// Kind of service
    pub service_type: ServiceType,

    /// Coarse status classification
    pub status: HealthStatus,

    /// Numeric metrics from the latest probe
    pub metrics: BTreeMap<String, f64>,

    /// When the probe producing this record completed
    pub last_check: DateTime<Utc>,
}

impl ServiceHealthRecord {
    pub fn new(
        service_id: ServiceId,
        service_type: ServiceType,
        status: HealthStatus,
        last_check: DateTime<Utc>,
    ) -> Self {
        Self {
            service_id,
            service_type,
            status,
            metrics: BTreeMap::new(),
            last_check,
        }
    }

    /// Builder-style metric insertion
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}
