//! STL (Seasonal-Trend decomposition using LOESS) implementation.
//!
//! STL decomposes a time series into three components:
//! - Trend: The underlying long-term pattern
//! - Seasonal: The repeating seasonal pattern
//! - Residual: The remainder after removing trend and seasonal
//!
//! Follows Cleveland et al. (1990): cycle-subseries are smoothed and
//! extended by one period on each side, the extended series is passed
//! through a low-pass filter (MA(p), MA(p), MA(3), LOESS) and the trend is
//! a LOESS smooth of the deseasonalized series. All smoothers use
//! local-linear fits by default.

use crate::error::{DetectionError, Result};
use crate::utils::stats::{median, variance};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Result of STL decomposition, positionally aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Trend component.
    pub trend: Vec<f64>,
    /// Seasonal component.
    pub seasonal: Vec<f64>,
    /// Residual component.
    pub residual: Vec<f64>,
}

impl Decomposition {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.trend.len()
    }

    /// Check if the decomposition is empty.
    pub fn is_empty(&self) -> bool {
        self.trend.is_empty()
    }

    /// Reconstructed value at `index` (`trend + seasonal + residual`).
    pub fn reconstruct(&self, index: usize) -> f64 {
        self.trend[index] + self.seasonal[index] + self.residual[index]
    }

    /// Get the seasonal strength (0 to 1).
    /// Values close to 1 indicate strong seasonality.
    pub fn seasonal_strength(&self) -> f64 {
        let var_residual = variance(&self.residual);
        let seasonal_plus_residual: Vec<f64> = self
            .seasonal
            .iter()
            .zip(self.residual.iter())
            .map(|(s, r)| s + r)
            .collect();
        let var_sr = variance(&seasonal_plus_residual);

        if var_sr.is_nan() || var_sr < 1e-10 {
            return 0.0;
        }

        (1.0 - var_residual / var_sr).clamp(0.0, 1.0)
    }

    /// Get the trend strength (0 to 1).
    /// Values close to 1 indicate strong trend.
    pub fn trend_strength(&self) -> f64 {
        let var_residual = variance(&self.residual);
        let trend_plus_residual: Vec<f64> = self
            .trend
            .iter()
            .zip(self.residual.iter())
            .map(|(t, r)| t + r)
            .collect();
        let var_tr = variance(&trend_plus_residual);

        if var_tr.is_nan() || var_tr < 1e-10 {
            return 0.0;
        }

        (1.0 - var_residual / var_tr).clamp(0.0, 1.0)
    }
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone)]
pub struct STL {
    /// Seasonal period.
    seasonal_period: usize,
    /// Seasonal LOESS span (ns).
    seasonal_smoothness: usize,
    /// Trend LOESS span (nt).
    trend_smoothness: usize,
    /// Low-pass LOESS span (nl).
    low_pass_smoothness: usize,
    /// Local polynomial degree of the seasonal smoother (0 or 1).
    seasonal_degree: usize,
    /// Local polynomial degree of the trend smoother (0 or 1).
    trend_degree: usize,
    /// Local polynomial degree of the low-pass smoother (0 or 1).
    low_pass_degree: usize,
    /// Number of inner iterations.
    inner_iterations: usize,
    /// Number of outer (robustness) iterations.
    outer_iterations: usize,
    /// Use robust fitting.
    robust: bool,
}

impl STL {
    /// Create a new STL decomposer with the given seasonal period.
    pub fn new(seasonal_period: usize) -> Self {
        let ns = 7;
        let nt = (1.5 * seasonal_period as f64 / (1.0 - 1.5 / ns as f64)).ceil() as usize;
        let nl = seasonal_period + 1;

        Self {
            seasonal_period,
            seasonal_smoothness: ns,
            trend_smoothness: odd_at_least(nt),
            low_pass_smoothness: odd_at_least(nl),
            seasonal_degree: 1,
            trend_degree: 1,
            low_pass_degree: 1,
            inner_iterations: 5,
            outer_iterations: 0,
            robust: false,
        }
    }

    /// Seasonal period.
    pub fn period(&self) -> usize {
        self.seasonal_period
    }

    /// Set custom seasonal smoothness (ns parameter).
    pub fn with_seasonal_smoothness(mut self, ns: usize) -> Self {
        self.seasonal_smoothness = odd_at_least(ns.max(3));
        self
    }

    /// Set custom trend smoothness (nt parameter).
    pub fn with_trend_smoothness(mut self, nt: usize) -> Self {
        self.trend_smoothness = odd_at_least(nt.max(3));
        self
    }

    /// Set custom low-pass smoothness (nl parameter).
    pub fn with_low_pass_smoothness(mut self, nl: usize) -> Self {
        self.low_pass_smoothness = odd_at_least(nl.max(3));
        self
    }

    /// Use local-constant (0) or local-linear (1) seasonal fits.
    pub fn with_seasonal_degree(mut self, degree: usize) -> Self {
        self.seasonal_degree = degree.min(1);
        self
    }

    /// Enable robust fitting with default iterations.
    pub fn robust(mut self) -> Self {
        self.robust = true;
        self.inner_iterations = 2;
        self.outer_iterations = 15;
        self
    }

    /// Set number of outer (robustness) iterations.
    pub fn with_outer_iterations(mut self, n: usize) -> Self {
        self.outer_iterations = n;
        self.robust = n > 0;
        self
    }

    /// Set number of inner iterations.
    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(1);
        self
    }

    /// Decompose the series.
    ///
    /// Requires at least one full period; fewer than two periods still run
    /// but the seasonal estimate is of poor quality.
    pub fn decompose(&self, series: &[f64]) -> Result<Decomposition> {
        let n = series.len();
        let period = self.seasonal_period;

        if period < 2 {
            return Err(DetectionError::InvalidParameter(
                "seasonal period must be at least 2".to_string(),
            ));
        }
        if n < period {
            return Err(DetectionError::InsufficientData {
                needed: period,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::ComputationError(
                "series contains non-finite values".to_string(),
            ));
        }
        if n < 2 * period {
            warn!(
                points = n,
                period, "fewer than two seasonal periods; decomposition quality is undefined"
            );
        }

        let mut seasonal = vec![0.0; n];
        let mut trend = vec![0.0; n];
        let mut weights: Option<Vec<f64>> = None;

        let passes = if self.robust { self.outer_iterations + 1 } else { 1 };

        for pass in 0..passes {
            for _ in 0..self.inner_iterations {
                self.inner_step(series, &mut trend, &mut seasonal, weights.as_deref());
            }

            if pass + 1 < passes {
                let fitted: Vec<f64> = series
                    .iter()
                    .zip(seasonal.iter())
                    .zip(trend.iter())
                    .map(|((y, s), t)| y - s - t)
                    .collect();
                weights = Some(robustness_weights(&fitted));
            }
        }

        let residual: Vec<f64> = series
            .iter()
            .zip(seasonal.iter())
            .zip(trend.iter())
            .map(|((y, s), t)| y - s - t)
            .collect();

        Ok(Decomposition {
            trend,
            seasonal,
            residual,
        })
    }

    /// One pass of the inner loop: detrend, smooth cycle-subseries,
    /// low-pass, deseasonalize, smooth trend.
    fn inner_step(
        &self,
        series: &[f64],
        trend: &mut Vec<f64>,
        seasonal: &mut [f64],
        weights: Option<&[f64]>,
    ) {
        let n = series.len();
        let period = self.seasonal_period;

        let detrended: Vec<f64> = series.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();

        // Length n + 2 * period
        let cycle = self.smooth_cycle_subseries(&detrended, weights);
        let low_pass = self.low_pass_filter(&cycle);

        for i in 0..n {
            seasonal[i] = cycle[period + i] - low_pass[i];
        }

        let deseasonalized: Vec<f64> = series
            .iter()
            .zip(seasonal.iter())
            .map(|(y, s)| y - s)
            .collect();

        *trend = loess_smooth(&deseasonalized, self.trend_smoothness, self.trend_degree, weights);
    }

    /// Smooth each cycle-subseries and extend it by one point on each end.
    ///
    /// Returns a series of length `n + 2 * period` whose slot `period + i`
    /// lines up with input index `i`.
    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: Option<&[f64]>) -> Vec<f64> {
        let n = detrended.len();
        let period = self.seasonal_period;
        let mut result = vec![0.0; n + 2 * period];

        for cycle_pos in 0..period {
            let values: Vec<f64> = (cycle_pos..n).step_by(period).map(|i| detrended[i]).collect();
            let sub_weights: Option<Vec<f64>> =
                weights.map(|w| (cycle_pos..n).step_by(period).map(|i| w[i]).collect());
            let k = values.len();

            for m in 0..k + 2 {
                let position = m as f64 - 1.0;
                let fallback = values[m.saturating_sub(1).min(k - 1)];
                let smoothed = loess_estimate(
                    &values,
                    sub_weights.as_deref(),
                    position,
                    self.seasonal_smoothness,
                    self.seasonal_degree,
                )
                .unwrap_or(fallback);
                result[cycle_pos + m * period] = smoothed;
            }
        }

        result
    }

    /// Low-pass filter of the extended cycle-subseries, back to length n.
    fn low_pass_filter(&self, cycle: &[f64]) -> Vec<f64> {
        let period = self.seasonal_period;

        let ma1 = moving_average(cycle, period);
        let ma2 = moving_average(&ma1, period);
        let ma3 = moving_average(&ma2, 3);

        loess_smooth(&ma3, self.low_pass_smoothness, self.low_pass_degree, None)
    }
}

impl Default for STL {
    fn default() -> Self {
        Self::new(24) // Daily cycle of an hourly series
    }
}

/// Smallest odd integer >= `n`.
fn odd_at_least(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Trailing moving average: `len - window + 1` outputs.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    series
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// LOESS smoothing evaluated at every index.
fn loess_smooth(values: &[f64], span: usize, degree: usize, weights: Option<&[f64]>) -> Vec<f64> {
    (0..values.len())
        .map(|i| loess_estimate(values, weights, i as f64, span, degree).unwrap_or(values[i]))
        .collect()
}

/// Local fit at position `x` (which may lie outside `0..n` for
/// extrapolation) using the `span` nearest points and tricube weights.
///
/// Returns `None` when every neighbour has zero weight.
fn loess_estimate(
    values: &[f64],
    robustness: Option<&[f64]>,
    x: f64,
    span: usize,
    degree: usize,
) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }

    let (left, right) = if span >= n {
        (0, n - 1)
    } else {
        let centre = x.round() as isize - (span / 2) as isize;
        let left = centre.clamp(0, (n - span) as isize) as usize;
        (left, left + span - 1)
    };

    let mut h = (x - left as f64).max(right as f64 - x);
    if span > n {
        h += ((span - n) / 2) as f64;
    }

    let h_outer = 0.999 * h;
    let h_inner = 0.001 * h;

    let mut local_weights = vec![0.0; right - left + 1];
    let mut total = 0.0;
    for j in left..=right {
        let dist = (j as f64 - x).abs();
        if dist <= h_outer {
            let tricube = if dist <= h_inner {
                1.0
            } else {
                (1.0 - (dist / h).powi(3)).powi(3)
            };
            let w = tricube * robustness.map_or(1.0, |r| r[j]);
            local_weights[j - left] = w;
            total += w;
        }
    }

    if total <= 0.0 {
        return None;
    }
    for w in local_weights.iter_mut() {
        *w /= total;
    }

    if degree > 0 && h > 0.0 {
        let centre: f64 = local_weights
            .iter()
            .enumerate()
            .map(|(k, w)| w * (left + k) as f64)
            .sum();
        let spread: f64 = local_weights
            .iter()
            .enumerate()
            .map(|(k, w)| w * ((left + k) as f64 - centre).powi(2))
            .sum();

        if spread.sqrt() > 0.001 * (n - 1) as f64 {
            let slope = (x - centre) / spread;
            for (k, w) in local_weights.iter_mut().enumerate() {
                *w *= slope * ((left + k) as f64 - centre) + 1.0;
            }
        }
    }

    Some(
        local_weights
            .iter()
            .zip(&values[left..=right])
            .map(|(w, y)| w * y)
            .sum(),
    )
}

/// Bisquare robustness weights from the current residual.
fn robustness_weights(residual: &[f64]) -> Vec<f64> {
    let abs_residual: Vec<f64> = residual.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs_residual);

    abs_residual
        .iter()
        .map(|&r| {
            if h < 1e-10 {
                return 1.0;
            }
            let u = r / h;
            if u <= 0.001 {
                1.0
            } else if u <= 0.999 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::stats::population_std_dev;
    use std::f64::consts::PI;

    fn generate_seasonal_series(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let trend = 0.1 * i as f64;
                let seasonal = 10.0 * ((2.0 * PI * i as f64 / period as f64).sin());
                trend + seasonal
            })
            .collect()
    }

    fn assert_additive(series: &[f64], result: &Decomposition) {
        for i in 0..series.len() {
            let reconstructed = result.reconstruct(i);
            assert!(
                (series[i] - reconstructed).abs() < 1e-9,
                "Reconstruction failed at index {}: {} vs {}",
                i,
                series[i],
                reconstructed
            );
        }
    }

    #[test]
    fn stl_default_parameters_for_hourly_data() {
        let stl = STL::default();
        assert_eq!(stl.period(), 24);
        assert_eq!(stl.seasonal_smoothness, 7);
        // ceil(1.5 * 24 / (1 - 1.5 / 7)) = 46 -> next odd
        assert_eq!(stl.trend_smoothness, 47);
        assert_eq!(stl.low_pass_smoothness, 25);
    }

    #[test]
    fn stl_basic_decomposition() {
        let period = 24;
        let series = generate_seasonal_series(240, period);

        let result = STL::new(period).decompose(&series).unwrap();

        assert_eq!(result.len(), series.len());
        assert_eq!(result.seasonal.len(), series.len());
        assert_eq!(result.residual.len(), series.len());
        assert_additive(&series, &result);
    }

    #[test]
    fn stl_detects_seasonality() {
        let period = 12;
        let series = generate_seasonal_series(120, period);

        let result = STL::new(period).decompose(&series).unwrap();

        let strength = result.seasonal_strength();
        assert!(strength > 0.9, "Expected strong seasonality, got {}", strength);
    }

    #[test]
    fn stl_detects_trend() {
        let n = 120;
        let period = 12;
        let series: Vec<f64> = (0..n)
            .map(|i| {
                let trend = 2.0 * i as f64;
                let seasonal = 0.1 * ((2.0 * PI * i as f64 / period as f64).sin());
                trend + seasonal
            })
            .collect();

        let result = STL::new(period).decompose(&series).unwrap();

        let strength = result.trend_strength();
        assert!(strength > 0.9, "Expected strong trend, got {}", strength);
    }

    #[test]
    fn stl_linear_trend_is_captured_exactly() {
        let series: Vec<f64> = (0..96).map(|i| 5.0 + 0.5 * i as f64).collect();

        let result = STL::new(24).decompose(&series).unwrap();

        for (i, &s) in result.seasonal.iter().enumerate() {
            assert!(s.abs() < 1e-8, "Seasonal should vanish at {}: {}", i, s);
        }
        for (i, &r) in result.residual.iter().enumerate() {
            assert!(r.abs() < 1e-8, "Residual should vanish at {}: {}", i, r);
        }
    }

    #[test]
    fn stl_constant_series() {
        let series = vec![5.0; 100];

        let result = STL::new(10).decompose(&series).unwrap();

        for &s in &result.seasonal {
            assert!(s.abs() < 1e-9, "Seasonal should be near zero");
        }
        for &r in &result.residual {
            assert!(r.abs() < 1e-9, "Residual should be near zero");
        }
    }

    #[test]
    fn stl_exactly_periodic_series_has_negligible_residual() {
        let series: Vec<f64> = (0..240)
            .map(|i| 100.0 + 10.0 * (2.0 * PI * (i % 24) as f64 / 24.0).sin())
            .collect();

        let result = STL::new(24).decompose(&series).unwrap();

        assert!(population_std_dev(&result.residual) < 1e-9);
        assert!(result.seasonal_strength() > 0.99);
    }

    #[test]
    fn stl_insufficient_data() {
        let series = vec![1.0; 10];

        let err = STL::new(12).decompose(&series).unwrap_err();
        assert_eq!(err, DetectionError::InsufficientData { needed: 12, got: 10 });

        let err = STL::new(24).decompose(&[]).unwrap_err();
        assert_eq!(err, DetectionError::InsufficientData { needed: 24, got: 0 });
    }

    #[test]
    fn stl_short_series_still_runs() {
        // Between one and two periods: runs with a quality caveat
        let series = generate_seasonal_series(30, 24);

        let result = STL::new(24).decompose(&series).unwrap();
        assert_additive(&series, &result);
    }

    #[test]
    fn stl_rejects_degenerate_period_and_non_finite_input() {
        assert!(matches!(
            STL::new(1).decompose(&[1.0, 2.0, 3.0]),
            Err(DetectionError::InvalidParameter(_))
        ));

        let mut series = generate_seasonal_series(48, 12);
        series[5] = f64::NAN;
        assert!(matches!(
            STL::new(12).decompose(&series),
            Err(DetectionError::ComputationError(_))
        ));
    }

    #[test]
    fn stl_is_deterministic() {
        let series = generate_seasonal_series(200, 24);
        let stl = STL::new(24);

        assert_eq!(stl.decompose(&series).unwrap(), stl.decompose(&series).unwrap());
    }

    #[test]
    fn stl_robust_decomposition() {
        let period = 12;
        let mut series = generate_seasonal_series(120, period);
        series[30] = 100.0;
        series[60] = -100.0;

        let result = STL::new(period).robust().decompose(&series).unwrap();

        assert_additive(&series, &result);
        let strength = result.seasonal_strength();
        assert!(
            strength > 0.1,
            "Robust STL should still detect seasonality: {}",
            strength
        );
        // Outliers end up in the residual rather than the seasonal pattern
        assert!(result.residual[30] > 50.0);
        assert!(result.residual[60] < -50.0);
    }

    #[test]
    fn stl_custom_smoothness() {
        let period = 12;
        let series = generate_seasonal_series(120, period);

        let stl = STL::new(period)
            .with_seasonal_smoothness(8)
            .with_trend_smoothness(21)
            .with_low_pass_smoothness(13)
            .with_seasonal_degree(0)
            .with_inner_iterations(3);

        assert_eq!(stl.seasonal_smoothness, 9);
        let result = stl.decompose(&series).unwrap();
        assert_additive(&series, &result);
    }

    #[test]
    fn stl_result_strengths_in_range() {
        let series = generate_seasonal_series(120, 12);
        let result = STL::new(12).decompose(&series).unwrap();

        let seasonal = result.seasonal_strength();
        let trend = result.trend_strength();
        assert!((0.0..=1.0).contains(&seasonal), "Seasonal strength: {}", seasonal);
        assert!((0.0..=1.0).contains(&trend), "Trend strength: {}", trend);
    }

    #[test]
    fn loess_reproduces_lines_and_extrapolates() {
        let line: Vec<f64> = (0..10).map(|i| 2.0 + 3.0 * i as f64).collect();

        let inside = loess_estimate(&line, None, 4.0, 5, 1).unwrap();
        assert!((inside - 14.0).abs() < 1e-9);

        let before = loess_estimate(&line, None, -1.0, 5, 1).unwrap();
        assert!((before - (-1.0)).abs() < 1e-9);

        let after = loess_estimate(&line, None, 10.0, 5, 1).unwrap();
        assert!((after - 32.0).abs() < 1e-9);
    }

    #[test]
    fn moving_average_shortens_series() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
    }
}
