//! Detection error types

use thiserror::Error;

/// Errors from anomaly detection
///
/// These degrade silently: the detector falls back to threshold results
/// for the tick and logs the failure. They never propagate to the loop.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Model fitting failed
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Scoring a feature vector failed
    #[error("inference failed: {0}")]
    Inference(String),

    /// No usable numeric features in the history
    #[error("feature history is empty")]
    EmptyFeatures,
}

/// Result alias for detection operations
pub type DetectResult<T> = Result<T, DetectError>;
