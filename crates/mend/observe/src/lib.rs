//! MEND Observe - Engine metrics
//!
//! One [`EngineMetrics`] struct registered against a caller-supplied
//! prometheus [`Registry`](prometheus::Registry). The control loop is the
//! only writer; everything else reads through the scrape endpoint.

#![deny(unsafe_code)]

pub mod exporter;
pub mod metrics;

pub use exporter::export_metrics;
pub use metrics::EngineMetrics;
