//! Standardized-residual scoring.
//!
//! Flags hours whose seasonal-decomposition residual lies more than
//! `z_threshold` population standard deviations from the residual mean.

use crate::ensemble::{Detector, DetectorInput, DetectorOutput, Method};
use crate::error::{DetectionError, Result};
use crate::seasonality::Decomposition;
use crate::utils::stats::{finite_range, mean, population_std_dev};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for residual scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualConfig {
    /// Absolute z-score above which an hour is flagged.
    pub z_threshold: f64,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self { z_threshold: 3.5 }
    }
}

impl ResidualConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(DetectionError::InvalidParameter(format!(
                "z_threshold must be positive, got {}",
                self.z_threshold
            )));
        }
        Ok(())
    }
}

/// Residual z-scores with flags and per-index confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualScores {
    /// Signed standardized residuals (0 where the residual is not finite).
    pub z_scores: Vec<f64>,
    /// `|z| > z_threshold`.
    pub flags: Vec<bool>,
    /// `min(1, |z| / 5)`.
    pub confidence: Vec<f64>,
    /// Population standard deviation of the finite residuals.
    pub std_dev: f64,
}

impl ResidualScores {
    /// Indices whose flag is set.
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &flag)| flag)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Scores the residual component of a decomposition.
#[derive(Debug, Clone, Default)]
pub struct ResidualScorer {
    config: ResidualConfig,
}

impl ResidualScorer {
    pub fn new(config: ResidualConfig) -> Self {
        Self { config }
    }

    /// Confidence attached to a standardized residual.
    pub fn confidence(z: f64) -> f64 {
        (z.abs() / 5.0).min(1.0)
    }

    /// Standardize the residuals of `decomposition`.
    pub fn score(&self, decomposition: &Decomposition) -> Result<ResidualScores> {
        let n = decomposition.len();
        let residual = &decomposition.residual;

        let finite: Vec<f64> = residual.iter().copied().filter(|r| r.is_finite()).collect();
        if finite.len() < 2 {
            return Err(DetectionError::InsufficientData {
                needed: 2,
                got: finite.len(),
            });
        }

        let reconstructed: Vec<f64> = (0..n).map(|i| decomposition.reconstruct(i)).collect();
        let scale = match finite_range(&reconstructed) {
            Some((lo, hi)) if lo == hi => return Err(DetectionError::ConstantSeries),
            Some((lo, hi)) => lo.abs().max(hi.abs()),
            None => return Err(DetectionError::ConstantSeries),
        };

        let center = mean(&finite);
        let std_dev = population_std_dev(&finite);

        if std_dev <= 1e-9 * scale {
            debug!(std_dev, scale, "residual at noise level; nothing to flag");
            return Ok(ResidualScores {
                z_scores: vec![0.0; n],
                flags: vec![false; n],
                confidence: vec![0.0; n],
                std_dev,
            });
        }

        let z_scores: Vec<f64> = residual
            .iter()
            .map(|&r| if r.is_finite() { (r - center) / std_dev } else { 0.0 })
            .collect();
        let flags: Vec<bool> = z_scores
            .iter()
            .map(|z| z.abs() > self.config.z_threshold)
            .collect();
        let confidence = z_scores.iter().map(|&z| Self::confidence(z)).collect();

        Ok(ResidualScores {
            z_scores,
            flags,
            confidence,
            std_dev,
        })
    }
}

impl Detector for ResidualScorer {
    fn method(&self) -> Method {
        Method::ZScore
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorOutput> {
        if input.decomposition.len() != input.hourly.len() {
            return Err(DetectionError::DimensionMismatch {
                expected: input.hourly.len(),
                got: input.decomposition.len(),
            });
        }

        let scores = self.score(input.decomposition)?;
        Ok(DetectorOutput {
            method: Method::ZScore,
            flags: scores.flags,
            scores: scores.z_scores.iter().map(|z| z.abs()).collect(),
            signed_scores: Some(scores.z_scores),
        })
    }
}
