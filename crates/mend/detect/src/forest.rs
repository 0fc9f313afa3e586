//! Isolation-forest outlier scoring
//!
//! Minimal in-process implementation: random binary trees over random
//! feature splits; outliers isolate in short paths. Scores follow the
//! standard normalization `2^(-E[h(x)] / c(n))`, so values near 1.0 are
//! strongly anomalous and values near 0.5 are ordinary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DetectError, DetectResult};

/// Forest tuning knobs
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees
    pub trees: usize,
    /// Subsample size per tree
    pub subsample: usize,
    /// RNG seed for reproducible fits
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 64,
            subsample: 128,
            seed: 7,
        }
    }
}

enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    External {
        size: usize,
    },
}

/// A fitted isolation forest
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit a forest over row-major data.
    pub fn fit(data: &[Vec<f64>], config: &ForestConfig) -> DetectResult<Self> {
        if data.is_empty() || data[0].is_empty() {
            return Err(DetectError::EmptyFeatures);
        }
        let dims = data[0].len();
        if data.iter().any(|row| row.len() != dims) {
            return Err(DetectError::ModelFit("ragged feature rows".into()));
        }
        if data
            .iter()
            .flat_map(|row| row.iter())
            .any(|v| !v.is_finite())
        {
            return Err(DetectError::ModelFit("non-finite feature value".into()));
        }

        if data.len() < 2 {
            return Err(DetectError::ModelFit("need at least two rows".into()));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let sample_size = config.subsample.min(data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(config.trees);
        for _ in 0..config.trees {
            let mut indices: Vec<usize> = (0..data.len()).collect();
            // Partial Fisher-Yates for the subsample
            for i in 0..sample_size {
                let j = rng.gen_range(i..indices.len());
                indices.swap(i, j);
            }
            indices.truncate(sample_size);
            trees.push(Self::build(data, &indices, 0, max_depth, &mut rng));
        }

        Ok(Self { trees, sample_size })
    }

    fn build(
        data: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if indices.len() <= 1 || depth >= max_depth {
            return Node::External {
                size: indices.len(),
            };
        }

        let dims = data[0].len();
        let feature = rng.gen_range(0..dims);
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &i in indices {
            min = min.min(data[i][feature]);
            max = max.max(data[i][feature]);
        }
        if min >= max {
            return Node::External {
                size: indices.len(),
            };
        }

        let split = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| data[i][feature] < split);

        Node::Internal {
            feature,
            split,
            left: Box::new(Self::build(data, &left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(data, &right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(node: &Node, point: &[f64], depth: f64) -> f64 {
        match node {
            Node::External { size } => depth + average_path_length(*size),
            Node::Internal {
                feature,
                split,
                left,
                right,
            } => {
                if point[*feature] < *split {
                    Self::path_length(left, point, depth + 1.0)
                } else {
                    Self::path_length(right, point, depth + 1.0)
                }
            }
        }
    }

    /// Anomaly score in (0, 1); higher is more anomalous.
    pub fn score(&self, point: &[f64]) -> DetectResult<f64> {
        if self.trees.is_empty() {
            return Err(DetectError::Inference("forest has no trees".into()));
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| Self::path_length(tree, point, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return Err(DetectError::Inference("degenerate sample size".into()));
        }
        let score = 2f64.powf(-mean_path / c);
        if !score.is_finite() {
            return Err(DetectError::Inference("non-finite score".into()));
        }
        Ok(score)
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    const EULER: f64 = 0.577_215_664_901_532_9;
    2.0 * ((n - 1.0).ln() + EULER) - 2.0 * (n - 1.0) / n
}
