//! Policy configuration
//!
//! Loaded once at startup and treated as read-only by the engine. Reload
//! is an external concern.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High/low bounds and sustain duration for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    /// Upper bound; values above it start the sustain timer
    pub high: Option<f64>,

    /// Lower bound; values below it start the sustain timer
    pub low: Option<f64>,

    /// How long the condition must persist before it is confirmed
    pub sustain_minutes: u32,
}

impl MetricThreshold {
    pub fn high(bound: f64, sustain_minutes: u32) -> Self {
        Self {
            high: Some(bound),
            low: None,
            sustain_minutes,
        }
    }

    pub fn low(bound: f64, sustain_minutes: u32) -> Self {
        Self {
            high: None,
            low: Some(bound),
            sustain_minutes,
        }
    }

    pub fn band(low: f64, high: f64, sustain_minutes: u32) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
            sustain_minutes,
        }
    }

    pub fn sustain(&self) -> Duration {
        Duration::from_secs(u64::from(self.sustain_minutes) * 60)
    }
}

/// Configuration validation failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("metric '{metric}' defines neither a high nor a low bound")]
    EmptyThreshold { metric: String },

    #[error("metric '{metric}' has low bound {low} above high bound {high}")]
    InvertedBounds { metric: String, low: f64, high: f64 },

    #[error("max_hourly_spend must be non-negative, got {0}")]
    NegativeSpendCap(f64),

    #[error("max_actions_per_hour must be at least 1")]
    ZeroActionRate,

    #[error("max_instances must be at least 1")]
    ZeroMaxInstances,
}

/// Safety and detection policy for one monitored domain
///
/// Read-only after load; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Per-metric thresholds for the threshold detection strategy
    pub thresholds: BTreeMap<String, MetricThreshold>,

    /// Per-action-kind cooldown overrides (kind label -> minutes)
    pub cooldown_minutes: BTreeMap<String, u32>,

    /// Cooldown applied to kinds without an override
    pub default_cooldown_minutes: u32,

    /// Cap on committed hourly spend across all targets
    pub max_hourly_spend: f64,

    /// Fleet size ceiling for provisioning actions
    pub max_instances: u32,

    /// Cost-impact magnitude above which an action requires confirmation
    pub confirmation_cost_threshold: f64,

    /// Cap on actions executed in any trailing 60 minutes
    pub max_actions_per_hour: u32,

    /// When set, every proposed action is blocked and only recorded
    pub dry_run: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::new(),
            cooldown_minutes: BTreeMap::new(),
            default_cooldown_minutes: 30,
            max_hourly_spend: 50.0,
            max_instances: 10,
            confirmation_cost_threshold: 10.0,
            max_actions_per_hour: 6,
            dry_run: false,
        }
    }
}

impl PolicyConfig {
    /// Validate bounds once at startup.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (metric, threshold) in &self.thresholds {
            match (threshold.low, threshold.high) {
                (None, None) => {
                    return Err(ConfigValidationError::EmptyThreshold {
                        metric: metric.clone(),
                    })
                }
                (Some(low), Some(high)) if low > high => {
                    return Err(ConfigValidationError::InvertedBounds {
                        metric: metric.clone(),
                        low,
                        high,
                    })
                }
                _ => {}
            }
        }
        if self.max_hourly_spend < 0.0 {
            return Err(ConfigValidationError::NegativeSpendCap(
                self.max_hourly_spend,
            ));
        }
        if self.max_actions_per_hour == 0 {
            return Err(ConfigValidationError::ZeroActionRate);
        }
        if self.max_instances == 0 {
            return Err(ConfigValidationError::ZeroMaxInstances);
        }
        Ok(())
    }

    /// Cooldown for an action kind label, falling back to the default.
    pub fn cooldown_for(&self, kind_label: &str) -> Duration {
        let minutes = self
            .cooldown_minutes
            .get(kind_label)
            .copied()
            .unwrap_or(self.default_cooldown_minutes);
        Duration::from_secs(u64::from(minutes) * 60)
    }

    /// Threshold for a metric, if one is configured.
    pub fn threshold_for(&self, metric: &str) -> Option<&MetricThreshold> {
        self.thresholds.get(metric)
    }
}
