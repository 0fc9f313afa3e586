//! MEND Control - The autonomous remediation loop
//!
//! One [`ControlLoop`] owns a monitoring domain end to end: collect
//! health snapshots, detect anomalies, propose actions, gate them,
//! dispatch the approved ones, and audit completions. Phases run in a
//! fixed order every tick; a failure in one phase is logged and counted
//! but never aborts the tick or the loop.
//!
//! The loop is driven either by [`ControlLoop::spawn`] on a fixed
//! interval with graceful shutdown, or tick by tick through
//! [`ControlLoop::run_tick_at`] with an injected clock.

#![deny(unsafe_code)]

pub mod controller;
pub mod error;
pub mod notify;

pub use controller::{ControlLoop, ControlLoopConfig, ControlLoopHandle, LoopPhase, TickReport};
pub use error::{ControlError, ControlResult};
pub use notify::{LogSink, MemorySink, NotificationSink, NotifyDetails, Severity};
