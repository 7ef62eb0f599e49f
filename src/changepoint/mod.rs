//! Changepoint detection algorithms.
//!
//! Provides methods to detect structural changes in time series.
//!
//! # Available Algorithms
//!
//! - **Binary segmentation**: greedy top-down splitting under the L2 cost
//!
//! # Example
//!
//! ```
//! use anofox_anomaly::changepoint::{binseg_detect, BinSegConfig};
//!
//! // Create series with a level shift
//! let mut series = vec![0.0; 50];
//! series.extend(vec![10.0; 50]);
//!
//! let result = binseg_detect(&series, &BinSegConfig::default()).unwrap();
//!
//! // Breakpoints end with the series length
//! assert_eq!(result.breakpoints, vec![50, 100]);
//! ```

pub mod binseg;
pub mod cost;

pub use binseg::{binseg_detect, BinSegConfig, BinSegResult};
pub use cost::{l2_cost, SegmentCosts};
