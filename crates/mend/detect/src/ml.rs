//! Multivariate outlier strategy
//!
//! Aggregates feature vectors across all monitored services. Once the
//! history passes a minimum sample count the forest is fit on
//! standardized features and the latest vector per service is scored.
//! Whether this path earns its keep is decided by the effectiveness
//! ledger, not here: the strategy stays swappable and the threshold
//! strategy remains the load-bearing fallback.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use mend_ingest::SampleBuffer;
use mend_types::{AnomalyEvent, DetectionStrategyKind, ServiceHealthRecord};

use crate::detector::DetectionStrategy;
use crate::error::{DetectError, DetectResult};
use crate::forest::{ForestConfig, IsolationForest};

/// ML strategy tuning knobs
#[derive(Debug, Clone)]
pub struct MlConfig {
    /// Minimum aggregated feature rows before the model activates
    pub min_samples: usize,

    /// Maximum retained feature rows
    pub window: usize,

    /// Scores at or above this mark the vector as an outlier
    pub score_threshold: f64,

    /// Forest parameters
    pub forest: ForestConfig,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            min_samples: 50,
            window: 1000,
            score_threshold: 0.6,
            forest: ForestConfig::default(),
        }
    }
}

/// Isolation-forest-style outlier strategy
pub struct MlStrategy {
    config: MlConfig,
    /// Aggregated metric rows across all services, oldest first
    history: VecDeque<BTreeMap<String, f64>>,
}

impl MlStrategy {
    pub fn new(config: MlConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// Whether enough history has accumulated for scoring.
    pub fn is_active(&self) -> bool {
        self.history.len() >= self.config.min_samples
    }

    fn push_row(&mut self, metrics: &BTreeMap<String, f64>) {
        self.history.push_back(metrics.clone());
        while self.history.len() > self.config.window {
            self.history.pop_front();
        }
    }

    /// Union of metric names across the retained history, sorted.
    fn feature_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for row in &self.history {
            names.extend(row.keys().cloned());
        }
        names.into_iter().collect()
    }

    fn vectorize(row: &BTreeMap<String, f64>, names: &[String]) -> Vec<f64> {
        names
            .iter()
            .map(|name| row.get(name).copied().unwrap_or(0.0))
            .collect()
    }

    /// Column-wise z-standardization; zero-variance columns pass through.
    fn standardize(rows: &mut [Vec<f64>]) {
        if rows.is_empty() {
            return;
        }
        let dims = rows[0].len();
        let n = rows.len() as f64;
        for d in 0..dims {
            let mean = rows.iter().map(|r| r[d]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[d] - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            let std = if std > 1e-12 { std } else { 1.0 };
            for row in rows.iter_mut() {
                row[d] = (row[d] - mean) / std;
            }
        }
    }

    /// Name of the most deviant feature in the standardized latest row.
    fn dominant_feature(latest: &[f64], names: &[String]) -> String {
        let mut best = 0usize;
        let mut best_abs = f64::NEG_INFINITY;
        for (i, v) in latest.iter().enumerate() {
            if v.abs() > best_abs {
                best_abs = v.abs();
                best = i;
            }
        }
        names
            .get(best)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl DetectionStrategy for MlStrategy {
    fn kind(&self) -> DetectionStrategyKind {
        DetectionStrategyKind::Ml
    }

    fn detect(
        &mut self,
        record: &ServiceHealthRecord,
        _buffer: &SampleBuffer,
        now: DateTime<Utc>,
    ) -> DetectResult<Vec<AnomalyEvent>> {
        if record.metrics.is_empty() {
            return Ok(Vec::new());
        }
        self.push_row(&record.metrics);

        if !self.is_active() {
            return Ok(Vec::new());
        }

        let names = self.feature_names();
        if names.is_empty() {
            return Err(DetectError::EmptyFeatures);
        }

        let mut rows: Vec<Vec<f64>> = self
            .history
            .iter()
            .map(|row| Self::vectorize(row, &names))
            .collect();
        Self::standardize(&mut rows);

        let latest = rows
            .last()
            .cloned()
            .ok_or(DetectError::EmptyFeatures)?;

        let forest = IsolationForest::fit(&rows, &self.config.forest)?;
        let score = forest.score(&latest)?;

        if score >= self.config.score_threshold {
            let metric = Self::dominant_feature(&latest, &names);
            Ok(vec![AnomalyEvent::new(
                record.service_id.clone(),
                metric,
                score.abs(),
                DetectionStrategyKind::Ml,
                now,
            )
            .with_context("outlier_score", format!("{score:.4}"))
            .with_context("features", format!("{}", names.len()))])
        } else {
            Ok(Vec::new())
        }
    }
}
