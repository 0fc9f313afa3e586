//! MEND Ingest - Health collection and metric buffering
//!
//! The MetricsIngester pulls one health snapshot per monitored service
//! from an external [`HealthProbe`] each tick, with bounded-concurrency
//! fan-out and a per-probe timeout. Snapshots are normalized into
//! per-service ring buffers that retain a fixed time window.

#![deny(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod ingester;
pub mod probe;

pub use buffer::SampleBuffer;
pub use error::{IngestError, IngestResult};
pub use ingester::{IngesterConfig, MetricsIngester};
pub use probe::{HealthProbe, ServiceDescriptor, StaticProbe};
