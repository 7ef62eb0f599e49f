//! Utility functions.

pub mod stats;

pub use stats::{
    finite_range, mean, median, percentile, population_std_dev, population_variance, round_to,
    running_median, variance,
};
