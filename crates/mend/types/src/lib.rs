//! MEND Types - Core types for the remediation engine
//!
//! MEND is an autonomous infrastructure remediation engine. It observes
//! health signals from heterogeneous services, detects anomalous
//! conditions, proposes corrective actions, gates them behind safety
//! policy, executes approved actions, and audits outcomes.
//!
//! ## Architectural Boundaries
//!
//! - **mend-ingest** owns: health collection and metric buffering
//! - **mend-detect** owns: anomaly detection strategies
//! - **mend-policy** owns: action proposal and safety gating
//! - **mend-executor** owns: action execution and rollback
//! - **mend-ledger** owns: the append-only audit trail
//! - **mend-control** owns: the per-domain control loop
//!
//! This crate holds the data model shared by all of them.

#![deny(unsafe_code)]

pub mod action;
pub mod anomaly;
pub mod config;
pub mod effectiveness;
pub mod health;
pub mod ids;
pub mod outcome;

// Re-export main types
pub use action::{ActionKind, ActionStatus, RemediationAction, RiskTier, TransitionError};
pub use anomaly::{AnomalyEvent, DetectionStrategyKind};
pub use config::{ConfigValidationError, MetricThreshold, PolicyConfig};
pub use effectiveness::EffectivenessScore;
pub use health::{HealthStatus, MetricSample, ServiceHealthRecord, ServiceType};
pub use ids::{ActionId, AnomalyId, ServiceId};
pub use outcome::{ActionOutcome, OutcomeKind};
