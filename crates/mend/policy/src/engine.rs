//! Anomaly-to-action mapping
//!
//! The engine walks the static rule table for each anomaly event, asks the
//! first matching rule for a candidate, and biases the choice by the
//! historical effectiveness of the action kind. Candidates leave the
//! engine in Pending status; gating is a separate concern.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mend_types::{
    ActionKind, AnomalyEvent, EffectivenessScore, PolicyConfig, RemediationAction, RiskTier,
    ServiceHealthRecord,
};
use tracing::debug;

use crate::rules::{rule_table, Direction, PolicyRule, RuleOutcome};

/// Effectiveness-based demotion knobs
#[derive(Debug, Clone)]
pub struct EngineTuning {
    /// Success ratio below which a kind is considered ineffective
    pub effectiveness_floor: f64,

    /// Outcomes required before the ratio is trusted at all
    pub min_observations: u64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            effectiveness_floor: 0.30,
            min_observations: 5,
        }
    }
}

/// Maps anomaly events to candidate remediation actions
pub struct ActionPolicyEngine {
    config: PolicyConfig,
    tuning: EngineTuning,
    rules: Vec<PolicyRule>,
}

impl ActionPolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_tuning(config, EngineTuning::default())
    }

    pub fn with_tuning(config: PolicyConfig, tuning: EngineTuning) -> Self {
        Self {
            config,
            tuning,
            rules: rule_table(),
        }
    }

    /// Propose a remediation action for one anomaly event.
    ///
    /// Returns `None` when no rule matches or the matching rule declines
    /// (e.g. the fleet is already at its instance ceiling). The
    /// effectiveness snapshot is keyed by action kind label and is never
    /// written here.
    pub fn propose(
        &self,
        event: &AnomalyEvent,
        health: &ServiceHealthRecord,
        effectiveness: &HashMap<String, EffectivenessScore>,
        now: DateTime<Utc>,
    ) -> Option<RemediationAction> {
        let direction = event
            .context
            .get("direction")
            .and_then(|d| match d.as_str() {
                "high" => Some(Direction::High),
                "low" => Some(Direction::Low),
                _ => None,
            });

        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(event, health, direction));

        let Some(rule) = rule else {
            debug!(
                service_id = %event.service_id,
                metric = %event.metric,
                "No remediation rule matches anomaly"
            );
            return None;
        };

        let mut outcome = (rule.build)(event, health, self.config.max_instances)?;

        if let Some(fallback) = self.demote(&outcome, rule, effectiveness) {
            debug!(
                preferred = outcome.kind.label(),
                fallback = fallback.label(),
                "Demoting ineffective action kind to its fallback"
            );
            outcome = RuleOutcome {
                kind: fallback,
                cost_impact: 0.0,
                risk_tier: RiskTier::Medium,
            };
        }

        let requires_confirmation =
            outcome.cost_impact.abs() > self.config.confirmation_cost_threshold;

        let mut action = RemediationAction::new(
            outcome.kind,
            event.service_id.clone(),
            format!(
                "{} anomaly on {} (score {:.2}, {} strategy)",
                event.metric, event.service_id, event.score, event.strategy
            ),
            outcome.cost_impact,
            outcome.risk_tier,
        )
        .with_confirmation(requires_confirmation);
        action.created_at = now;
        Some(action)
    }

    /// Fallback kind when the preferred one has a poor track record.
    fn demote(
        &self,
        outcome: &RuleOutcome,
        rule: &PolicyRule,
        effectiveness: &HashMap<String, EffectivenessScore>,
    ) -> Option<ActionKind> {
        let fallback = rule.fallback.clone()?;
        let score = effectiveness.get(outcome.kind.label())?;
        if score.total() < self.tuning.min_observations {
            return None;
        }
        let ratio = score.ratio()?;
        if ratio < self.tuning.effectiveness_floor {
            Some(fallback)
        } else {
            None
        }
    }
}
