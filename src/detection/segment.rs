//! Structural-break scoring via binary segmentation.

use crate::changepoint::{binseg_detect, BinSegConfig, BinSegResult};
use crate::ensemble::{Detector, DetectorInput, DetectorOutput, Method};
use crate::error::{DetectionError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for segment scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Upper bound on detected change points.
    pub max_changepoints: usize,
    /// Minimum points per segment.
    pub min_segment_length: usize,
    /// Multiplier of the `ln(n) * variance` stopping penalty.
    pub penalty_factor: f64,
    /// Running-median width applied before segmenting (1 disables it).
    pub smoothing_window: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        let binseg = BinSegConfig::default();
        Self {
            max_changepoints: binseg.max_changepoints,
            min_segment_length: binseg.min_segment_length,
            penalty_factor: binseg.penalty_factor,
            smoothing_window: binseg.smoothing_window,
        }
    }
}

impl SegmentConfig {
    /// Set the change point budget.
    pub fn max_changepoints(mut self, max: usize) -> Self {
        self.max_changepoints = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_segment_length == 0 {
            return Err(DetectionError::InvalidParameter(
                "min_segment_length must be at least 1".to_string(),
            ));
        }
        if self.smoothing_window == 0 {
            return Err(DetectionError::InvalidParameter(
                "smoothing_window must be at least 1".to_string(),
            ));
        }
        if !(self.penalty_factor.is_finite() && self.penalty_factor >= 0.0) {
            return Err(DetectionError::InvalidParameter(format!(
                "penalty_factor must be non-negative, got {}",
                self.penalty_factor
            )));
        }
        Ok(())
    }

    fn binseg_config(&self) -> BinSegConfig {
        BinSegConfig::default()
            .max_changepoints(self.max_changepoints)
            .min_segment_length(self.min_segment_length)
            .penalty_factor(self.penalty_factor)
            .smoothing_window(self.smoothing_window)
    }
}

/// Flags the start of every new segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentScorer {
    config: SegmentConfig,
}

impl SegmentScorer {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Run binary segmentation on `values`.
    pub fn segment(&self, values: &[f64]) -> Result<BinSegResult> {
        self.config.validate()?;
        let result = binseg_detect(values, &self.config.binseg_config())?;
        debug!(
            points = values.len(),
            changepoints = result.n_changepoints,
            "segmentation complete"
        );
        Ok(result)
    }

    /// Per-index change point flags (the sentinel breakpoint is excluded).
    pub fn flags(&self, values: &[f64]) -> Result<Vec<bool>> {
        let result = self.segment(values)?;
        let mut flags = vec![false; values.len()];
        for &cp in result.changepoints() {
            flags[cp] = true;
        }
        Ok(flags)
    }
}

impl Detector for SegmentScorer {
    fn method(&self) -> Method {
        Method::ChangePoint
    }

    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorOutput> {
        let flags = self.flags(input.hourly.values())?;
        let scores = flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
        Ok(DetectorOutput {
            method: Method::ChangePoint,
            flags,
            scores,
            signed_scores: None,
        })
    }
}
