//! Control-loop metrics

use prometheus::{GaugeVec, IntCounter, IntCounterVec, Opts, Registry};

/// Metrics for the remediation engine
pub struct EngineMetrics {
    /// Completed control-loop ticks
    pub loop_runs_total: IntCounter,

    /// Phase-level failures, by phase
    pub phase_errors_total: IntCounterVec,

    /// Confirmed anomaly events, by detection strategy
    pub anomalies_total: IntCounterVec,

    /// Candidate actions produced by the policy engine
    pub proposals_total: IntCounter,

    /// Actions blocked by the safety gate, by reason
    pub safety_blocks_total: IntCounterVec,

    /// Executed actions, by kind and outcome
    pub executions_total: IntCounterVec,

    /// Current effectiveness ratio, by action kind
    pub effectiveness_ratio: GaugeVec,
}

impl EngineMetrics {
    /// Create and register engine metrics
    pub fn new(registry: &Registry) -> Self {
        let loop_runs_total =
            IntCounter::new("mend_loop_runs_total", "Completed control-loop ticks")
                .expect("Failed to create loop_runs_total metric");
        registry
            .register(Box::new(loop_runs_total.clone()))
            .expect("Failed to register loop_runs_total");

        let phase_errors_total = IntCounterVec::new(
            Opts::new("mend_phase_errors_total", "Control-loop phase failures"),
            &["phase"],
        )
        .expect("Failed to create phase_errors_total metric");
        registry
            .register(Box::new(phase_errors_total.clone()))
            .expect("Failed to register phase_errors_total");

        let anomalies_total = IntCounterVec::new(
            Opts::new("mend_anomalies_total", "Confirmed anomaly events"),
            &["strategy"],
        )
        .expect("Failed to create anomalies_total metric");
        registry
            .register(Box::new(anomalies_total.clone()))
            .expect("Failed to register anomalies_total");

        let proposals_total = IntCounter::new(
            "mend_proposals_total",
            "Candidate actions produced by the policy engine",
        )
        .expect("Failed to create proposals_total metric");
        registry
            .register(Box::new(proposals_total.clone()))
            .expect("Failed to register proposals_total");

        let safety_blocks_total = IntCounterVec::new(
            Opts::new("mend_safety_blocks_total", "Actions blocked by the safety gate"),
            &["reason"],
        )
        .expect("Failed to create safety_blocks_total metric");
        registry
            .register(Box::new(safety_blocks_total.clone()))
            .expect("Failed to register safety_blocks_total");

        let executions_total = IntCounterVec::new(
            Opts::new("mend_executions_total", "Executed remediation actions"),
            &["kind", "outcome"],
        )
        .expect("Failed to create executions_total metric");
        registry
            .register(Box::new(executions_total.clone()))
            .expect("Failed to register executions_total");

        let effectiveness_ratio = GaugeVec::new(
            Opts::new(
                "mend_effectiveness_ratio",
                "Success ratio per action kind from the audit ledger",
            ),
            &["kind"],
        )
        .expect("Failed to create effectiveness_ratio metric");
        registry
            .register(Box::new(effectiveness_ratio.clone()))
            .expect("Failed to register effectiveness_ratio");

        Self {
            loop_runs_total,
            phase_errors_total,
            anomalies_total,
            proposals_total,
            safety_blocks_total,
            executions_total,
            effectiveness_ratio,
        }
    }

    /// Record a confirmed anomaly event
    pub fn record_anomaly(&self, strategy: &str) {
        self.anomalies_total.with_label_values(&[strategy]).inc();
    }

    /// Record a gate block
    pub fn record_block(&self, reason: &str) {
        self.safety_blocks_total.with_label_values(&[reason]).inc();
    }

    /// Record a completed execution
    pub fn record_execution(&self, kind: &str, outcome: &str) {
        self.executions_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Record a phase failure
    pub fn record_phase_error(&self, phase: &str) {
        self.phase_errors_total.with_label_values(&[phase]).inc();
    }

    /// Update the effectiveness gauge for one kind
    pub fn set_effectiveness(&self, kind: &str, ratio: f64) {
        self.effectiveness_ratio
            .with_label_values(&[kind])
            .set(ratio);
    }
}
