//! MEND Detect - Anomaly detection strategies
//!
//! Two interchangeable strategies behind one contract: a threshold
//! strategy with sustained-duration hysteresis (the bootstrap strategy
//! and required fallback) and an isolation-forest-style multivariate
//! outlier scorer that activates once enough feature history exists.
//!
//! ML failures never reach the control loop: the detector logs them and
//! degrades to threshold results for that tick.

#![deny(unsafe_code)]

pub mod detector;
pub mod error;
pub mod forest;
pub mod ml;
pub mod threshold;

pub use detector::{AnomalyDetector, DetectionStrategy};
pub use error::{DetectError, DetectResult};
pub use ml::{MlConfig, MlStrategy};
pub use threshold::ThresholdStrategy;
