//! Anomaly detector
//!
//! Runs the threshold strategy and, when configured, the ML strategy over
//! a just-collected health record. ML failures degrade silently to the
//! threshold results for that tick. At most one event is emitted per
//! (service, metric) per tick.

use std::collections::HashSet;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use mend_ingest::SampleBuffer;
use mend_types::{AnomalyEvent, DetectionStrategyKind, ServiceHealthRecord};
use tracing::{debug, warn};

use crate::error::DetectResult;

/// Contract shared by detection strategies.
///
/// Strategies own their per-(service, metric) state, so calls take
/// `&mut self`; the detector is owned exclusively by one control loop,
/// which itself lives inside a spawned task.
pub trait DetectionStrategy: Send + Sync {
    /// Which strategy this is, for event tagging and logging.
    fn kind(&self) -> DetectionStrategyKind;

    /// Evaluate one service's freshly collected record.
    fn detect(
        &mut self,
        record: &ServiceHealthRecord,
        buffer: &SampleBuffer,
        now: DateTime<Utc>,
    ) -> DetectResult<Vec<AnomalyEvent>>;
}

/// Default bound on the retained event history
const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Orchestrates detection strategies with fallback and dedup
pub struct AnomalyDetector {
    threshold: Box<dyn DetectionStrategy>,
    ml: Option<Box<dyn DetectionStrategy>>,
    history: VecDeque<AnomalyEvent>,
    history_limit: usize,
}

impl AnomalyDetector {
    /// Detector with the threshold strategy only.
    pub fn new(threshold: Box<dyn DetectionStrategy>) -> Self {
        Self {
            threshold,
            ml: None,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Attach an optional ML strategy.
    pub fn with_ml(mut self, ml: Box<dyn DetectionStrategy>) -> Self {
        self.ml = Some(ml);
        self
    }

    /// Detect anomalies for one service.
    ///
    /// Threshold results always count; ML results are added unless the
    /// model fails, in which case the failure is logged and the tick
    /// proceeds on threshold output alone. Duplicate (service, metric)
    /// detections within the call are suppressed, threshold first.
    pub fn detect(
        &mut self,
        record: &ServiceHealthRecord,
        buffer: &SampleBuffer,
        now: DateTime<Utc>,
    ) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        match self.threshold.detect(record, buffer, now) {
            Ok(found) => {
                for event in found {
                    if seen.insert(event.metric.clone()) {
                        events.push(event);
                    }
                }
            }
            Err(e) => {
                // Threshold is the bootstrap strategy; a failure here
                // yields no events for this service this tick.
                warn!(service_id = %record.service_id, error = %e, "Threshold detection failed");
            }
        }

        if let Some(ml) = self.ml.as_mut() {
            match ml.detect(record, buffer, now) {
                Ok(found) => {
                    for event in found {
                        if seen.insert(event.metric.clone()) {
                            events.push(event);
                        } else {
                            debug!(
                                service_id = %record.service_id,
                                metric = %event.metric,
                                "Duplicate detection suppressed"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        service_id = %record.service_id,
                        error = %e,
                        "ML detection failed, falling back to threshold results"
                    );
                }
            }
        }

        for event in &events {
            self.history.push_back(event.clone());
            while self.history.len() > self.history_limit {
                self.history.pop_front();
            }
        }
        events
    }

    /// Recent events, oldest first, bounded.
    pub fn recent_events(&self) -> impl Iterator<Item = &AnomalyEvent> {
        self.history.iter()
    }
}
