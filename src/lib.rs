//! # anofox-anomaly
//!
//! Ensemble anomaly detection for hourly-aggregated time series.
//!
//! Raw rows are bucketed into an hourly series, decomposed with STL, and
//! scored by three independent detectors: standardized seasonal residuals,
//! Isolation Forest density scores and binary-segmentation change points.
//! A voting step merges the three flag sets into a typed,
//! confidence-scored anomaly list.
//!
//! # Example
//!
//! ```
//! use anofox_anomaly::prelude::*;
//! use chrono::{TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut values: Vec<f64> = (0..24 * 10)
//!     .map(|i| 100.0 + 30.0 * ((i % 24) as f64 / 24.0 * std::f64::consts::TAU).sin())
//!     .collect();
//! values[130] += 900.0;
//!
//! let hourly = HourlySeries::from_values(start, values).unwrap();
//! let run = detect_hourly(hourly, &DetectionConfig::default()).unwrap();
//!
//! assert!(run
//!     .anomalies
//!     .iter()
//!     .any(|a| a.timestamp == run.hourly.timestamps()[130]));
//! ```

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::needless_range_loop)]

pub mod changepoint;
pub mod core;
pub mod detection;
pub mod ensemble;
pub mod error;
pub mod pipeline;
pub mod seasonality;
pub mod utils;

pub use error::{DetectionError, Result};

pub mod prelude {
    pub use crate::core::{aggregate_hourly, Column, HourlySeries, RawTable};
    pub use crate::ensemble::{
        Anomaly, AnomalyType, Detector, DetectorInput, DetectorOutput, LabelingScheme, Method,
        VoteSet, VotingAggregator, VotingPolicy,
    };
    pub use crate::error::{DetectionError, Result};
    pub use crate::pipeline::{
        detect_anomalies, detect_hourly, DetectionConfig, DetectionRun, DEFAULT_DETAIL_RADIUS_HOURS,
    };
    pub use crate::seasonality::{Decomposition, STL};
}
