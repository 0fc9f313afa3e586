//! Per-service ring buffer of metric samples
//!
//! Samples are appended in probe order and pruned against a fixed
//! retention window rather than a fixed capacity, so the buffer holds
//! exactly the trailing window the detector needs.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mend_types::MetricSample;

/// Bounded time-window buffer of metric samples for one service
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<MetricSample>,
    retention: Duration,
}

impl SampleBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
        }
    }

    /// Append a sample and prune anything older than the retention window.
    pub fn push(&mut self, sample: MetricSample, now: DateTime<Utc>) {
        self.samples.push_back(sample);
        self.prune(now);
    }

    /// Drop samples that fell out of the retention window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now
            - chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::hours(1));
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// All retained samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// Retained samples for one metric, oldest first.
    pub fn metric_samples<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a MetricSample> {
        self.samples.iter().filter(move |s| s.metric == metric)
    }

    /// Latest sample for one metric.
    pub fn latest(&self, metric: &str) -> Option<&MetricSample> {
        self.samples.iter().rev().find(|s| s.metric == metric)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
