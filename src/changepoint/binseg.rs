//! Binary segmentation for changepoint detection.
//!
//! Greedy top-down search under the L2 cost: repeatedly split the segment
//! whose best split yields the largest cost reduction until the reduction
//! no longer exceeds the penalty or the changepoint budget is exhausted.
//!
//! The search runs on a running-median copy of the series, so a single
//! extreme point neither becomes a changepoint nor inflates the penalty.

use super::cost::SegmentCosts;
use crate::error::{DetectionError, Result};
use crate::utils::stats::{population_variance, running_median};
use tracing::trace;

/// Configuration for binary segmentation.
#[derive(Debug, Clone)]
pub struct BinSegConfig {
    /// Maximum number of changepoints
    pub max_changepoints: usize,
    /// Minimum segment length
    pub min_segment_length: usize,
    /// Penalty multiplier applied to `ln(n) * variance`
    pub penalty_factor: f64,
    /// Running-median width applied before segmenting (1 disables it)
    pub smoothing_window: usize,
}

impl Default for BinSegConfig {
    fn default() -> Self {
        Self {
            max_changepoints: 15,
            min_segment_length: 2,
            penalty_factor: 2.0,
            smoothing_window: 5,
        }
    }
}

impl BinSegConfig {
    /// Set the changepoint budget.
    pub fn max_changepoints(mut self, max: usize) -> Self {
        self.max_changepoints = max;
        self
    }

    /// Set minimum segment length.
    pub fn min_segment_length(mut self, min_len: usize) -> Self {
        self.min_segment_length = min_len.max(1);
        self
    }

    /// Set the penalty multiplier.
    pub fn penalty_factor(mut self, factor: f64) -> Self {
        self.penalty_factor = factor;
        self
    }

    /// Set the running-median width.
    pub fn smoothing_window(mut self, window: usize) -> Self {
        self.smoothing_window = window.max(1);
        self
    }

    /// Stopping penalty for a series: `factor * ln(n) * population variance`.
    pub fn penalty_for(&self, series: &[f64]) -> f64 {
        if series.len() < 2 {
            return 0.0;
        }
        self.penalty_factor * (series.len() as f64).ln() * population_variance(series)
    }
}

/// Result of binary segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSegResult {
    /// Sorted segment end points; the last entry is always the series length
    pub breakpoints: Vec<usize>,
    /// Segment boundaries (start, end) pairs
    pub segments: Vec<(usize, usize)>,
    /// Total cost of the smoothed series (excluding penalty)
    pub cost: f64,
    /// Number of changepoints
    pub n_changepoints: usize,
}

impl BinSegResult {
    /// Changepoint indices (breakpoints without the trailing sentinel).
    pub fn changepoints(&self) -> &[usize] {
        let end = self.breakpoints.len().saturating_sub(1);
        &self.breakpoints[..end]
    }

    /// Get the segment containing a specific index.
    pub fn segment_for_index(&self, index: usize) -> Option<(usize, usize)> {
        self.segments
            .iter()
            .find(|&&(start, end)| index >= start && index < end)
            .copied()
    }

    /// Get segment means.
    pub fn segment_means(&self, series: &[f64]) -> Vec<f64> {
        self.segments
            .iter()
            .map(|&(start, end)| {
                let segment = &series[start..end];
                if segment.is_empty() {
                    f64::NAN
                } else {
                    segment.iter().sum::<f64>() / segment.len() as f64
                }
            })
            .collect()
    }
}

/// Detect changepoints using binary segmentation.
///
/// # Arguments
/// * `series` - Input time series
/// * `config` - Segmentation configuration
///
/// # Returns
/// Breakpoints including the sentinel `series.len()`.
pub fn binseg_detect(series: &[f64], config: &BinSegConfig) -> Result<BinSegResult> {
    let n = series.len();
    if n < 2 {
        return Err(DetectionError::InsufficientData { needed: 2, got: n });
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(DetectionError::ComputationError(
            "series contains non-finite values".to_string(),
        ));
    }

    let smoothed = running_median(series, config.smoothing_window);
    let costs = SegmentCosts::new(&smoothed);
    let total_cost = costs.cost(0, n);
    let min_len = config.min_segment_length.max(1);
    let threshold = config.penalty_for(&smoothed).max(1e-9 * total_cost);

    let mut breakpoints = vec![n];
    let is_constant = smoothed.iter().all(|&v| v == smoothed[0]);

    while !is_constant && breakpoints.len() - 1 < config.max_changepoints {
        let mut best: Option<(usize, f64)> = None;
        let mut start = 0;

        for &end in &breakpoints {
            if end - start >= 2 * min_len {
                for split in (start + min_len)..=(end - min_len) {
                    let gain = costs.split_gain(start, split, end);
                    if best.map_or(true, |(_, g)| gain > g) {
                        best = Some((split, gain));
                    }
                }
            }
            start = end;
        }

        match best {
            Some((split, gain)) if gain > threshold => {
                trace!(split, gain, "accepted split");
                let pos = breakpoints.partition_point(|&b| b < split);
                breakpoints.insert(pos, split);
            }
            _ => break,
        }
    }

    let mut segments = Vec::with_capacity(breakpoints.len());
    let mut start = 0;
    for &end in &breakpoints {
        segments.push((start, end));
        start = end;
    }

    let cost = segments.iter().map(|&(s, e)| costs.cost(s, e)).sum();

    Ok(BinSegResult {
        n_changepoints: breakpoints.len() - 1,
        breakpoints,
        segments,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn binseg_no_changepoint_for_constant() {
        let series = vec![5.0; 20];
        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();

        assert_eq!(result.n_changepoints, 0);
        assert_eq!(result.breakpoints, vec![20]);
        assert!(result.changepoints().is_empty());
        assert_eq!(result.segments, vec![(0, 20)]);
    }

    #[test]
    fn binseg_one_clear_changepoint() {
        let mut series = vec![0.0; 10];
        series.extend(vec![10.0; 10]);

        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();

        assert_eq!(result.n_changepoints, 1);
        assert_eq!(result.breakpoints, vec![10, 20]);
        assert_eq!(result.changepoints(), &[10]);
        assert_eq!(result.segments, vec![(0, 10), (10, 20)]);
        assert_relative_eq!(result.cost, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn binseg_two_changepoints() {
        let mut series = vec![0.0; 10];
        series.extend(vec![10.0; 10]);
        series.extend(vec![0.0; 10]);

        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();

        assert_eq!(result.breakpoints, vec![10, 20, 30]);
    }

    #[test]
    fn binseg_step_survives_isolated_spike() {
        let mut series = vec![5.0; 150];
        series.extend(vec![50.0; 150]);
        series[50] = 10_000.0;

        let config = BinSegConfig::default().max_changepoints(5);
        let result = binseg_detect(&series, &config).unwrap();

        assert_eq!(result.breakpoints, vec![150, 300]);
    }

    #[test]
    fn binseg_spike_alone_is_not_a_changepoint() {
        let mut series = vec![10.0; 200];
        series[100] = 10_000.0;

        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();
        assert_eq!(result.breakpoints, vec![200]);
    }

    #[test]
    fn binseg_without_smoothing_uses_raw_values() {
        // Raw variance of the spike swamps the step
        let mut series = vec![5.0; 150];
        series.extend(vec![50.0; 150]);
        series[50] = 10_000.0;

        let config = BinSegConfig::default().smoothing_window(1);
        let result = binseg_detect(&series, &config).unwrap();
        assert!(!result.changepoints().contains(&150));
    }

    #[test]
    fn binseg_noise_does_not_split() {
        // Alternating values: best gain is tiny relative to the penalty
        let series: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();

        assert_eq!(result.n_changepoints, 0);
    }

    #[test]
    fn binseg_respects_changepoint_budget() {
        let series: Vec<f64> = (0..60).map(|i| ((i / 5) * 10) as f64).collect();

        let config = BinSegConfig::default().max_changepoints(3);
        let result = binseg_detect(&series, &config).unwrap();

        assert_eq!(result.n_changepoints, 3);
        assert_eq!(result.breakpoints.last(), Some(&60));
        assert!(result.breakpoints.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn binseg_high_penalty_no_changepoints() {
        let mut series = vec![0.0; 10];
        series.extend(vec![100.0; 10]);

        let config = BinSegConfig::default().penalty_factor(1000.0);
        let result = binseg_detect(&series, &config).unwrap();

        assert_eq!(result.n_changepoints, 0);
    }

    #[test]
    fn binseg_min_segment_length() {
        let mut series = vec![0.0; 2];
        series.extend(vec![100.0; 18]);

        let config = BinSegConfig::default().min_segment_length(5);
        let result = binseg_detect(&series, &config).unwrap();

        for &cp in result.changepoints() {
            assert!(cp >= 5);
            assert!(cp <= 15);
        }
    }

    #[test]
    fn binseg_minimal_and_empty_series() {
        let result = binseg_detect(&[1.0, 2.0], &BinSegConfig::default()).unwrap();
        assert_eq!(result.breakpoints.last(), Some(&2));

        assert_eq!(
            binseg_detect(&[], &BinSegConfig::default()).unwrap_err(),
            DetectionError::InsufficientData { needed: 2, got: 0 }
        );
        assert_eq!(
            binseg_detect(&[1.0], &BinSegConfig::default()).unwrap_err(),
            DetectionError::InsufficientData { needed: 2, got: 1 }
        );
    }

    #[test]
    fn binseg_config_builder() {
        let config = BinSegConfig::default()
            .max_changepoints(4)
            .min_segment_length(0)
            .penalty_factor(3.0)
            .smoothing_window(0);

        assert_eq!(config.max_changepoints, 4);
        assert_eq!(config.min_segment_length, 1);
        assert_relative_eq!(config.penalty_factor, 3.0, epsilon = 1e-10);
        assert_eq!(config.smoothing_window, 1);
    }

    #[test]
    fn binseg_penalty_scales_with_variance() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        let config = BinSegConfig::default();
        // 2 * ln(5) * 2.0
        assert_relative_eq!(config.penalty_for(&series), 4.0 * 5.0_f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn binseg_segment_helpers() {
        let mut series = vec![1.0; 5];
        series.extend(vec![10.0; 5]);

        let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();

        let means = result.segment_means(&series);
        assert_eq!(means.len(), 2);
        assert_relative_eq!(means[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(means[1], 10.0, epsilon = 1e-10);
        assert_eq!(result.segment_for_index(3), Some((0, 5)));
        assert_eq!(result.segment_for_index(7), Some((5, 10)));
        assert_eq!(result.segment_for_index(10), None);
    }
}
