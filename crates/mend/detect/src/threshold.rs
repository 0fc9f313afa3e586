//! Threshold strategy with sustained-duration hysteresis
//!
//! Per (service, metric) state machine: a value crossing its configured
//! bound starts a timer. If the condition persists beyond the sustain
//! duration, one event is confirmed; if the value returns within bounds
//! first, the timer resets to nil. A confirmed breach latches and does
//! not re-fire until the metric recovers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mend_ingest::SampleBuffer;
use mend_types::{
    anomaly::HEALTH_STATUS_METRIC, AnomalyEvent, DetectionStrategyKind, MetricThreshold,
    PolicyConfig, ServiceHealthRecord, ServiceId,
};
use tracing::debug;

use crate::detector::DetectionStrategy;
use crate::error::DetectResult;

/// Score for a sustained threshold breach
const SUSTAINED_SCORE: f64 = 0.7;
/// Score for a pre-classified Critical health status
const CRITICAL_SCORE: f64 = 0.9;

/// Which bound was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreachDirection {
    High,
    Low,
}

impl BreachDirection {
    fn as_str(self) -> &'static str {
        match self {
            BreachDirection::High => "high",
            BreachDirection::Low => "low",
        }
    }
}

/// Hysteresis state for one (service, metric)
#[derive(Debug, Clone)]
struct BreachState {
    direction: BreachDirection,
    since: DateTime<Utc>,
    confirmed: bool,
}

/// Sustained-threshold detection strategy
pub struct ThresholdStrategy {
    config: PolicyConfig,
    breaches: HashMap<(ServiceId, String), BreachState>,
    /// Services whose Critical status has already fired
    critical_latched: HashMap<ServiceId, ()>,
}

impl ThresholdStrategy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            breaches: HashMap::new(),
            critical_latched: HashMap::new(),
        }
    }

    fn classify(threshold: &MetricThreshold, value: f64) -> Option<(BreachDirection, f64)> {
        if let Some(high) = threshold.high {
            if value > high {
                return Some((BreachDirection::High, high));
            }
        }
        if let Some(low) = threshold.low {
            if value < low {
                return Some((BreachDirection::Low, low));
            }
        }
        None
    }

    fn check_metric(
        &mut self,
        record: &ServiceHealthRecord,
        metric: &str,
        value: f64,
        now: DateTime<Utc>,
    ) -> Option<AnomalyEvent> {
        let threshold = self.config.threshold_for(metric)?.clone();
        let key = (record.service_id.clone(), metric.to_string());

        let Some((direction, bound)) = Self::classify(&threshold, value) else {
            // Back in bounds before (or after) confirmation: reset to nil
            self.breaches.remove(&key);
            return None;
        };

        let sustain = chrono::Duration::from_std(threshold.sustain())
            .unwrap_or_else(|_| chrono::Duration::minutes(i64::from(threshold.sustain_minutes)));

        match self.breaches.get_mut(&key) {
            Some(state) if state.direction == direction => {
                if state.confirmed {
                    return None; // latched until recovery
                }
                if now - state.since >= sustain {
                    state.confirmed = true;
                    let held = now - state.since;
                    return Some(
                        AnomalyEvent::new(
                            record.service_id.clone(),
                            metric,
                            SUSTAINED_SCORE,
                            DetectionStrategyKind::Threshold,
                            now,
                        )
                        .with_context("value", format!("{value}"))
                        .with_context("bound", format!("{bound}"))
                        .with_context("direction", direction.as_str())
                        .with_context("held_secs", format!("{}", held.num_seconds())),
                    );
                }
                None
            }
            _ => {
                // New breach, or direction flipped: restart the timer
                self.breaches.insert(
                    key,
                    BreachState {
                        direction,
                        since: now,
                        confirmed: sustain.is_zero(),
                    },
                );
                if sustain.is_zero() {
                    return Some(
                        AnomalyEvent::new(
                            record.service_id.clone(),
                            metric,
                            SUSTAINED_SCORE,
                            DetectionStrategyKind::Threshold,
                            now,
                        )
                        .with_context("value", format!("{value}"))
                        .with_context("bound", format!("{bound}"))
                        .with_context("direction", direction.as_str()),
                    );
                }
                None
            }
        }
    }

    fn check_status(
        &mut self,
        record: &ServiceHealthRecord,
        now: DateTime<Utc>,
    ) -> Option<AnomalyEvent> {
        if record.status.is_critical() {
            if self
                .critical_latched
                .insert(record.service_id.clone(), ())
                .is_some()
            {
                return None; // already fired for this outage
            }
            return Some(
                AnomalyEvent::new(
                    record.service_id.clone(),
                    HEALTH_STATUS_METRIC,
                    CRITICAL_SCORE,
                    DetectionStrategyKind::Threshold,
                    now,
                )
                .with_context("status", record.status.to_string()),
            );
        }
        self.critical_latched.remove(&record.service_id);
        None
    }
}

impl DetectionStrategy for ThresholdStrategy {
    fn kind(&self) -> DetectionStrategyKind {
        DetectionStrategyKind::Threshold
    }

    fn detect(
        &mut self,
        record: &ServiceHealthRecord,
        _buffer: &SampleBuffer,
        now: DateTime<Utc>,
    ) -> DetectResult<Vec<AnomalyEvent>> {
        let mut events = Vec::new();

        if let Some(event) = self.check_status(record, now) {
            events.push(event);
        }

        let metrics: Vec<(String, f64)> = record
            .metrics
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (metric, value) in metrics {
            if let Some(event) = self.check_metric(record, &metric, value, now) {
                debug!(
                    service_id = %event.service_id,
                    metric = %event.metric,
                    score = event.score,
                    "Threshold anomaly confirmed"
                );
                events.push(event);
            }
        }

        Ok(events)
    }
}
