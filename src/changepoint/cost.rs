//! Cost functions for changepoint detection.
//!
//! Cost functions evaluate the "cost" of fitting a model to a segment of data.
//! Lower cost indicates a better fit.

/// L2 cost: sum of squared deviations from mean.
///
/// Also known as residual sum of squares (RSS).
pub fn l2_cost(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }

    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    segment.iter().map(|x| (x - mean).powi(2)).sum()
}

/// Prefix sums for O(1) L2 segment costs.
///
/// The series is centred by its mean before accumulation so that large
/// offsets do not swamp the squared sums.
#[derive(Debug, Clone)]
pub struct SegmentCosts {
    cum_sum: Vec<f64>,
    cum_sum_sq: Vec<f64>,
}

impl SegmentCosts {
    pub fn new(series: &[f64]) -> Self {
        let offset = if series.is_empty() {
            0.0
        } else {
            series.iter().sum::<f64>() / series.len() as f64
        };

        let cum_sum: Vec<f64> = std::iter::once(0.0)
            .chain(series.iter().scan(0.0, |acc, &x| {
                *acc += x - offset;
                Some(*acc)
            }))
            .collect();

        let cum_sum_sq: Vec<f64> = std::iter::once(0.0)
            .chain(series.iter().scan(0.0, |acc, &x| {
                *acc += (x - offset) * (x - offset);
                Some(*acc)
            }))
            .collect();

        Self { cum_sum, cum_sum_sq }
    }

    /// Number of points covered.
    pub fn len(&self) -> usize {
        self.cum_sum.len() - 1
    }

    /// Check if no points are covered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// L2 cost of `series[start..end]`, floored at zero.
    pub fn cost(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        let len = (end - start) as f64;
        let sum = self.cum_sum[end] - self.cum_sum[start];
        let sum_sq = self.cum_sum_sq[end] - self.cum_sum_sq[start];
        (sum_sq - sum * sum / len).max(0.0)
    }

    /// Cost reduction from splitting `[start, end)` at `split`.
    pub fn split_gain(&self, start: usize, split: usize, end: usize) -> f64 {
        self.cost(start, end) - self.cost(start, split) - self.cost(split, end)
    }
}
