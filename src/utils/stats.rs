//! Statistical utility functions.

use std::cmp::Ordering;

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

/// Calculate the population variance of a slice (n denominator).
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Calculate the population standard deviation of a slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. Returns NaN for empty input.
///
/// # Example
/// ```
/// use anofox_anomaly::utils::percentile;
///
/// let p = percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5);
/// assert!((p - 3.0).abs() < 1e-12);
/// ```
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Minimum and maximum of the finite values, or `None` if there are none.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Centred running median spanning `2 * (window / 2) + 1` points.
///
/// The window shrinks symmetrically towards the ends, and the two end points
/// use Tukey's rule `median(x0, y1, 3 * y1 - 2 * y2)` so a linear or periodic
/// series keeps its ends. A window of 0 or 1 returns a copy.
pub fn running_median(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    if half == 0 || n < 3 {
        return values.to_vec();
    }

    let mut smoothed: Vec<f64> = (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            median(&values[i - h..=i + h])
        })
        .collect();

    smoothed[0] = median(&[values[0], smoothed[1], 3.0 * smoothed[1] - 2.0 * smoothed[2]]);
    smoothed[n - 1] = median(&[
        values[n - 1],
        smoothed[n - 2],
        3.0 * smoothed[n - 2] - 2.0 * smoothed[n - 3],
    ]);
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_calculates_correctly() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert_relative_eq!(mean(&[10.0]), 10.0, epsilon = 1e-10);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn variance_calculates_correctly() {
        // Sample variance of [1, 2, 3, 4, 5] = 2.5
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2.5, epsilon = 1e-10);
        assert!(variance(&[1.0]).is_nan());
        assert!(variance(&[]).is_nan());
    }

    #[test]
    fn population_variance_uses_n_denominator() {
        assert_relative_eq!(
            population_variance(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            2.0,
            epsilon = 1e-10
        );
        assert_relative_eq!(
            population_std_dev(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            2.0_f64.sqrt(),
            epsilon = 1e-10
        );
        assert_relative_eq!(population_variance(&[7.0]), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn median_calculates_correctly() {
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5, epsilon = 1e-10);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0, 2.0, 4.0]), 3.0, epsilon = 1e-10);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&values, 0.0), 10.0, epsilon = 1e-10);
        assert_relative_eq!(percentile(&values, 1.0), 40.0, epsilon = 1e-10);
        // pos = 0.5 * 3 = 1.5 -> halfway between 20 and 30
        assert_relative_eq!(percentile(&values, 0.5), 25.0, epsilon = 1e-10);
        // Unsorted input
        assert_relative_eq!(percentile(&[40.0, 10.0, 30.0, 20.0], 0.5), 25.0, epsilon = 1e-10);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn percentile_of_ties_is_the_tied_value() {
        let mut values = vec![1.0; 99];
        values.push(5.0);
        // pos = 0.99 * 99 = 98.01 -> both neighbours are 1.0
        assert_relative_eq!(percentile(&values, 0.99), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn finite_range_skips_non_finite() {
        assert_eq!(finite_range(&[3.0, f64::NAN, -1.0, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(finite_range(&[f64::NAN]), None);
        assert_eq!(finite_range(&[]), None);
    }

    #[test]
    fn running_median_removes_isolated_spikes_and_keeps_steps() {
        let mut values = vec![5.0; 6];
        values.extend(vec![50.0; 6]);
        values[2] = 10_000.0;

        let smoothed = running_median(&values, 5);

        assert_eq!(smoothed.len(), values.len());
        assert_eq!(&smoothed[..6], &[5.0; 6]);
        assert_eq!(&smoothed[6..], &[50.0; 6]);
    }

    #[test]
    fn running_median_handles_short_windows() {
        assert_eq!(running_median(&[3.0, 1.0, 2.0], 1), vec![3.0, 1.0, 2.0]);
        assert_eq!(running_median(&[1.0, 2.0], 5), vec![1.0, 2.0]);
        assert!(running_median(&[], 5).is_empty());
        // End points follow the extrapolated neighbours
        assert_eq!(running_median(&[90.0, 1.0, 1.0, 1.0, 1.0, 1.0], 5)[0], 1.0);
        assert_eq!(running_median(&[1.0, 1.0, 1.0, 1.0, 1.0, -90.0], 5)[5], 1.0);
    }

    #[test]
    fn running_median_keeps_linear_trend() {
        let values: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        assert_eq!(running_median(&values, 5), values);
    }

    #[test]
    fn round_to_two_decimals() {
        assert_relative_eq!(round_to(1.0 / 3.0, 2), 0.33, epsilon = 1e-12);
        assert_relative_eq!(round_to(2.0 / 3.0, 2), 0.67, epsilon = 1e-12);
        assert_relative_eq!(round_to(1.0, 2), 1.0, epsilon = 1e-12);
    }
}
