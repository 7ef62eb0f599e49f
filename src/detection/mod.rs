//! Anomaly scorers.
//!
//! Each scorer implements [`Detector`](crate::ensemble::Detector):
//! - [`ResidualScorer`]: standardized seasonal residuals
//! - [`DensityScorer`]: Isolation Forest scores over the hourly values
//! - [`SegmentScorer`]: binary-segmentation change points

mod density;
mod isolation_forest;
mod residual;
mod segment;

pub use density::{DensityConfig, DensityScorer, DensityScores};
pub use isolation_forest::{average_path_length, IsolationForest, IsolationForestConfig};
pub use residual::{ResidualConfig, ResidualScorer, ResidualScores};
pub use segment::{SegmentConfig, SegmentScorer};
