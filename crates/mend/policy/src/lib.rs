//! MEND Policy - Action proposal and safety gating
//!
//! The ActionPolicyEngine maps anomaly events to candidate remediation
//! actions through a static rule table keyed by (service type, trigger
//! condition), biased by historical effectiveness. The SafetyGate then
//! applies cooldown, budget, confirmation, and rate-limit checks in a
//! strict order before anything reaches the executor.
//!
//! Shared limit state (cooldown stamps, committed spend, execution
//! timestamps, the in-flight set) lives in [`SafetyLimits`], owned by one
//! control-loop domain and protected by a single mutex.

#![deny(unsafe_code)]

pub mod engine;
pub mod gate;
pub mod limits;
pub mod rules;

pub use engine::{ActionPolicyEngine, EngineTuning};
pub use gate::{BlockReason, GateDecision, SafetyGate};
pub use limits::SafetyLimits;
pub use rules::{Direction, PolicyRule};
