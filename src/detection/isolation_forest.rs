//! Isolation Forest over one-dimensional values.
//!
//! Liu, Ting & Zhou (2008): anomalies are isolated by fewer random splits,
//! so a short average path length maps to a score close to 1.

use crate::error::{DetectionError, Result};
use crate::utils::stats::finite_range;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Configuration for Isolation Forest fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsolationForestConfig {
    /// Number of trees.
    pub n_trees: usize,
    /// Points drawn (without replacement) per tree.
    pub sample_size: usize,
    /// Cap on the number of points the forest is fitted on.
    pub max_fit_samples: usize,
    /// Random seed.
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
            max_fit_samples: 5000,
            seed: 42,
        }
    }
}

impl IsolationForestConfig {
    /// Set the number of trees.
    pub fn n_trees(mut self, n: usize) -> Self {
        self.n_trees = n.max(1);
        self
    }

    /// Set the per-tree sample size.
    pub fn sample_size(mut self, n: usize) -> Self {
        self.sample_size = n.max(2);
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone)]
enum Node {
    Internal {
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// A single isolation tree stored as a flat arena.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(sample: &[f64], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(sample.to_vec(), 0, height_limit, rng);
        tree
    }

    /// Append the subtree for `points` and return its root index.
    fn grow(
        &mut self,
        points: Vec<f64>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let index = self.nodes.len();
        let size = points.len();

        let bounds = finite_range(&points);
        let (lo, hi) = match bounds {
            Some((lo, hi)) if depth < height_limit && size > 1 && lo < hi => (lo, hi),
            _ => {
                self.nodes.push(Node::Leaf { size });
                return index;
            }
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_points, right_points): (Vec<f64>, Vec<f64>) =
            points.into_iter().partition(|&v| v < threshold);

        if left_points.is_empty() || right_points.is_empty() {
            self.nodes.push(Node::Leaf { size });
            return index;
        }

        // Placeholder, patched once both children exist
        self.nodes.push(Node::Leaf { size });
        let left = self.grow(left_points, depth + 1, height_limit, rng);
        let right = self.grow(right_points, depth + 1, height_limit, rng);
        self.nodes[index] = Node::Internal {
            threshold,
            left,
            right,
        };
        index
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Internal {
                    threshold,
                    left,
                    right,
                } => {
                    index = if x < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted Isolation Forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit a forest on `values`.
    ///
    /// Errors on fewer than two values, non-finite values, or values that
    /// are all equal.
    pub fn fit(values: &[f64], config: &IsolationForestConfig) -> Result<Self> {
        let n = values.len();
        if n < 2 {
            return Err(DetectionError::InsufficientData { needed: 2, got: n });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::ComputationError(
                "isolation forest input contains non-finite values".to_string(),
            ));
        }
        match finite_range(values) {
            Some((lo, hi)) if lo < hi => {}
            _ => return Err(DetectionError::ConstantSeries),
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let fit_set: Vec<f64> = if n > config.max_fit_samples.max(2) {
            values
                .choose_multiple(&mut rng, config.max_fit_samples.max(2))
                .copied()
                .collect()
        } else {
            values.to_vec()
        };

        let sample_size = config.sample_size.max(2).min(fit_set.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..config.n_trees.max(1))
            .into_par_iter()
            .map(|t| {
                // One stream per tree keeps parallel fitting reproducible
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64 + 1));
                let sample: Vec<f64> = fit_set
                    .choose_multiple(&mut rng, sample_size)
                    .copied()
                    .collect();
                IsolationTree::build(&sample, height_limit, &mut rng)
            })
            .collect();

        Ok(Self { trees, sample_size })
    }

    /// Number of trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-tree sample size actually used.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Anomaly score of one value in `(0, 1]`.
    pub fn score(&self, x: f64) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }

    /// Anomaly scores for many values.
    pub fn score_samples(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.score(x)).collect()
    }
}
