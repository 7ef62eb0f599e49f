//! Density-based outlier scoring with an Isolation Forest.

use super::isolation_forest::{IsolationForest, IsolationForestConfig};
use crate::ensemble::{Detector, DetectorInput, DetectorOutput, Method};
use crate::error::{DetectionError, Result};
use crate::utils::stats::percentile;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for density scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Target outlier fraction in `(0, 0.5]`.
    pub contamination: f64,
    /// Number of isolation trees.
    pub n_trees: usize,
    /// Points drawn per tree.
    pub sample_size: usize,
    /// Cap on the number of points used for fitting.
    pub max_fit_samples: usize,
    /// Random seed.
    pub seed: u64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        let forest = IsolationForestConfig::default();
        Self {
            contamination: 0.01,
            n_trees: forest.n_trees,
            sample_size: forest.sample_size,
            max_fit_samples: forest.max_fit_samples,
            seed: forest.seed,
        }
    }
}

impl DensityConfig {
    /// Set the contamination target.
    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectionError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 {
            return Err(DetectionError::InvalidParameter(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if self.sample_size < 2 || self.max_fit_samples < 2 {
            return Err(DetectionError::InvalidParameter(
                "sample_size and max_fit_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    fn forest_config(&self) -> IsolationForestConfig {
        IsolationForestConfig {
            n_trees: self.n_trees,
            sample_size: self.sample_size,
            max_fit_samples: self.max_fit_samples,
            seed: self.seed,
        }
    }
}

/// Density scores with the percentile threshold and resulting flags.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityScores {
    /// Isolation score per value (higher = more anomalous).
    pub scores: Vec<f64>,
    /// `(1 - contamination)` percentile of `scores`.
    pub threshold: f64,
    /// `score > threshold`.
    pub flags: Vec<bool>,
}

/// Flags the top `contamination` fraction of values by isolation score.
#[derive(Debug, Clone, Default)]
pub struct DensityScorer {
    config: DensityConfig,
}

impl DensityScorer {
    pub fn new(config: DensityConfig) -> Self {
        Self { config }
    }

    /// Fit the forest on `values` and threshold the scores.
    pub fn score(&self, values: &[f64]) -> Result<DensityScores> {
        self.config.validate()?;

        let forest = IsolationForest::fit(values, &self.config.forest_config())?;
        let scores = forest.score_samples(values);
        let threshold = percentile(&scores, 1.0 - self.config.contamination);
        let flags: Vec<bool> = scores.iter().map(|&s| s > threshold).collect();

        debug!(
            points = values.len(),
            threshold,
            flagged = flags.iter().filter(|&&f| f).count(),
            "density scoring complete"
        );

        Ok(DensityScores {
            scores,
            threshold,
            flags,
        })
    }
}

impl Detector for DensityScorer {
    fn method(&self) -> Method {
        Method::IsolationForest
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorOutput> {
        let result = self.score(input.hourly.values())?;
        Ok(DetectorOutput {
            method: Method::IsolationForest,
            flags: result.flags,
            scores: result.scores,
            signed_scores: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_isolated_spike() {
        let mut values = vec![10.0; 200];
        values[100] = 10_000.0;

        let result = DensityScorer::default().score(&values).unwrap();

        let flagged: Vec<usize> = (0..values.len()).filter(|&i| result.flags[i]).collect();
        assert_eq!(flagged, vec![100]);
        assert!(result.scores[100] > result.threshold);
    }

    #[test]
    fn tied_scores_are_not_flagged() {
        // Two equally frequent levels: the percentile lands inside a tie
        let values: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { 2.0 }).collect();

        let result = DensityScorer::default().score(&values).unwrap();
        assert!(result.flags.iter().all(|&f| !f));
    }

    #[test]
    fn contamination_is_a_target_rate() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 7919) % 1000) as f64).collect();

        let result = DensityScorer::new(DensityConfig::default().contamination(0.05))
            .score(&values)
            .unwrap();

        let flagged = result.flags.iter().filter(|&&f| f).count();
        assert!(flagged > 0);
        assert!(flagged <= 60, "flagged {}", flagged);
    }

    #[test]
    fn invalid_contamination_is_rejected() {
        for contamination in [0.0, 0.6, f64::NAN] {
            let scorer = DensityScorer::new(DensityConfig::default().contamination(contamination));
            assert!(matches!(
                scorer.score(&[1.0, 2.0, 3.0]),
                Err(DetectionError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn degenerate_inputs_are_errors() {
        let scorer = DensityScorer::default();
        assert_eq!(
            scorer.score(&[]).unwrap_err(),
            DetectionError::InsufficientData { needed: 2, got: 0 }
        );
        assert_eq!(
            scorer.score(&[7.0; 30]).unwrap_err(),
            DetectionError::ConstantSeries
        );
    }
}
