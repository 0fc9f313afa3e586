//! Static remediation rule table
//!
//! Rules map (service type, triggering condition) to an action kind with
//! a cost-impact and risk estimate. The table is a compile-time decision
//! point: adding a kind means adding a rule here and matching it
//! exhaustively downstream.

use mend_types::{
    anomaly::HEALTH_STATUS_METRIC, ActionKind, AnomalyEvent, RiskTier, ServiceHealthRecord,
    ServiceType,
};

/// Estimated hourly cost of one GPU instance, used for provision and
/// terminate estimates.
pub const GPU_INSTANCE_HOURLY_COST: f64 = 2.5;

/// Metric the GPU rules read to enforce the fleet ceiling
pub const INSTANCE_COUNT_METRIC: &str = "instance_count";

/// Breach direction a rule triggers on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    High,
    Low,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::High => "high",
            Direction::Low => "low",
        }
    }
}

/// What a matched rule proposes
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub kind: ActionKind,
    pub cost_impact: f64,
    pub risk_tier: RiskTier,
}

/// One entry in the static rule table
pub struct PolicyRule {
    /// Service type the rule applies to; `None` matches any
    pub service_type: Option<ServiceType>,

    /// Triggering metric name
    pub metric: &'static str,

    /// Required breach direction; `None` matches any
    pub direction: Option<Direction>,

    /// Build the candidate; `None` declines (e.g. fleet at ceiling)
    pub build: fn(&AnomalyEvent, &ServiceHealthRecord, u32) -> Option<RuleOutcome>,

    /// Lower-risk alternative used when effectiveness is poor
    pub fallback: Option<ActionKind>,
}

impl PolicyRule {
    /// Whether this rule matches the event against the record.
    pub fn matches(
        &self,
        event: &AnomalyEvent,
        health: &ServiceHealthRecord,
        direction: Option<Direction>,
    ) -> bool {
        if let Some(service_type) = self.service_type {
            if service_type != health.service_type {
                return false;
            }
        }
        if self.metric != event.metric {
            return false;
        }
        match (self.direction, direction) {
            (None, _) => true,
            (Some(want), Some(got)) => want == got,
            (Some(_), None) => false,
        }
    }
}

fn provision_instance(
    _event: &AnomalyEvent,
    health: &ServiceHealthRecord,
    max_instances: u32,
) -> Option<RuleOutcome> {
    // Fleet ceiling: decline instead of proposing a doomed action
    let instances = health.metric(INSTANCE_COUNT_METRIC).unwrap_or(1.0) as u32;
    if instances >= max_instances {
        return None;
    }
    Some(RuleOutcome {
        kind: ActionKind::ProvisionInstance,
        cost_impact: GPU_INSTANCE_HOURLY_COST,
        risk_tier: RiskTier::Medium,
    })
}

fn terminate_instance(
    _event: &AnomalyEvent,
    _health: &ServiceHealthRecord,
    _max_instances: u32,
) -> Option<RuleOutcome> {
    Some(RuleOutcome {
        kind: ActionKind::TerminateInstance { instance: None },
        cost_impact: -GPU_INSTANCE_HOURLY_COST,
        risk_tier: RiskTier::Medium,
    })
}

fn restart_service(
    _event: &AnomalyEvent,
    _health: &ServiceHealthRecord,
    _max_instances: u32,
) -> Option<RuleOutcome> {
    Some(RuleOutcome {
        kind: ActionKind::RestartService,
        cost_impact: 0.0,
        risk_tier: RiskTier::Low,
    })
}

fn kill_queries(
    _event: &AnomalyEvent,
    _health: &ServiceHealthRecord,
    _max_instances: u32,
) -> Option<RuleOutcome> {
    Some(RuleOutcome {
        kind: ActionKind::KillQueries,
        cost_impact: 0.0,
        risk_tier: RiskTier::High,
    })
}

fn optimize_store(
    _event: &AnomalyEvent,
    _health: &ServiceHealthRecord,
    _max_instances: u32,
) -> Option<RuleOutcome> {
    Some(RuleOutcome {
        kind: ActionKind::OptimizeStore,
        cost_impact: 0.0,
        risk_tier: RiskTier::Low,
    })
}

/// The static rule table, first match wins.
pub fn rule_table() -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            service_type: Some(ServiceType::GpuFleet),
            metric: "gpu_utilization",
            direction: Some(Direction::High),
            build: provision_instance,
            fallback: None,
        },
        PolicyRule {
            service_type: Some(ServiceType::GpuFleet),
            metric: "gpu_utilization",
            direction: Some(Direction::Low),
            build: terminate_instance,
            fallback: None,
        },
        PolicyRule {
            service_type: Some(ServiceType::Database),
            metric: "error_rate",
            direction: Some(Direction::High),
            build: restart_service,
            fallback: None,
        },
        PolicyRule {
            service_type: Some(ServiceType::Database),
            metric: "lock_waits",
            direction: Some(Direction::High),
            build: kill_queries,
            fallback: Some(ActionKind::RestartService),
        },
        PolicyRule {
            service_type: Some(ServiceType::Cache),
            metric: "hit_rate",
            direction: Some(Direction::Low),
            build: optimize_store,
            fallback: None,
        },
        PolicyRule {
            service_type: Some(ServiceType::Container),
            metric: "memory_usage",
            direction: Some(Direction::High),
            build: restart_service,
            fallback: None,
        },
        PolicyRule {
            service_type: Some(ServiceType::Network),
            metric: "packet_loss",
            direction: Some(Direction::High),
            build: restart_service,
            fallback: None,
        },
        // Pre-classified Critical status: restart regardless of type
        PolicyRule {
            service_type: None,
            metric: HEALTH_STATUS_METRIC,
            direction: None,
            build: restart_service,
            fallback: None,
        },
    ]
}
