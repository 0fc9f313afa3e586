//! Anomaly events
//!
//! Created by the detector, consumed once by the policy engine, and kept
//! in a bounded history for reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnomalyId, ServiceId};

/// Metric name used for events derived from a pre-classified health status
/// rather than a numeric metric.
pub const HEALTH_STATUS_METRIC: &str = "health_status";

/// Which detection strategy produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionStrategyKind {
    /// Sustained-duration hysteresis over configured bounds
    Threshold,
    /// Multivariate outlier scoring
    Ml,
}

impl std::fmt::Display for DetectionStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionStrategyKind::Threshold => write!(f, "threshold"),
            DetectionStrategyKind::Ml => write!(f, "ml"),
        }
    }
}

/// A confirmed anomalous condition on one service metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    /// Unique event identifier
    pub id: AnomalyId,

    /// Affected service
    pub service_id: ServiceId,

    /// Metric that breached, or [`HEALTH_STATUS_METRIC`]
    pub metric: String,

    /// Confidence score in [0, 1]
    pub score: f64,

    /// When the condition was confirmed
    pub detected_at: DateTime<Utc>,

    /// Strategy that produced the event
    pub strategy: DetectionStrategyKind,

    /// Free-form detection context (observed value, bound, duration, ...)
    pub context: BTreeMap<String, String>,
}

impl AnomalyEvent {
    pub fn new(
        service_id: ServiceId,
        metric: impl Into<String>,
        score: f64,
        strategy: DetectionStrategyKind,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AnomalyId::generate(),
            service_id,
            metric: metric.into(),
            score: score.clamp(0.0, 1.0),
            detected_at,
            strategy,
            context: BTreeMap::new(),
        }
    }

    /// Builder-style context attachment
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Whether the event was derived from a health status classification
    pub fn is_status_event(&self) -> bool {
        self.metric == HEALTH_STATUS_METRIC
    }
}
