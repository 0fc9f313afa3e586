//! Ingest error types

use mend_types::ServiceId;
use thiserror::Error;

/// Errors from health collection
#[derive(Debug, Error)]
pub enum IngestError {
    /// Probe adapter reported the service as unreachable. Transient;
    /// the previous record is retained as stale.
    #[error("probe unavailable for {service_id}: {reason}")]
    ProbeUnavailable {
        service_id: ServiceId,
        reason: String,
    },

    /// Probe did not resolve within the configured timeout.
    #[error("probe for {service_id} timed out after {timeout_ms}ms")]
    ProbeTimeout {
        service_id: ServiceId,
        timeout_ms: u64,
    },

    /// Service was never registered with the ingester.
    #[error("unknown service {0}")]
    UnknownService(ServiceId),
}

/// Result alias for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;
