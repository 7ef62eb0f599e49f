//! Detector ensemble: a common detector contract and vote aggregation.
//!
//! Every scorer implements [`Detector`], producing one boolean flag per
//! hourly index. The [`VotingAggregator`] merges the flag vectors into a
//! deduplicated list of typed, confidence-scored [`Anomaly`] values.

mod voting;

pub use voting::{Anomaly, AnomalyType, LabelingScheme, VotingAggregator, VotingPolicy};

use crate::core::HourlySeries;
use crate::error::{DetectionError, Result};
use crate::seasonality::Decomposition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection method tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    /// Standardized seasonal residual.
    #[serde(rename = "zscore")]
    ZScore,
    /// Isolation Forest density score.
    #[serde(rename = "iforest")]
    IsolationForest,
    /// Structural break point.
    #[serde(rename = "changepoint")]
    ChangePoint,
}

impl Method {
    /// All methods in canonical order.
    pub const ALL: [Method; 3] = [Method::ZScore, Method::IsolationForest, Method::ChangePoint];

    /// Short machine tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Method::ZScore => "zscore",
            Method::IsolationForest => "iforest",
            Method::ChangePoint => "changepoint",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Method::ZScore => "Z-score",
            Method::IsolationForest => "Isolation Forest",
            Method::ChangePoint => "Change point",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Method::ZScore => 0b001,
            Method::IsolationForest => 0b010,
            Method::ChangePoint => 0b100,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Set of methods that fired at one index.
///
/// Iterates and serializes in canonical order regardless of insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Method>", from = "Vec<Method>")]
pub struct VoteSet(u8);

impl VoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method; returns `true` if it was not already present.
    pub fn insert(&mut self, method: Method) -> bool {
        let had = self.contains(method);
        self.0 |= method.bit();
        !had
    }

    /// Check membership.
    pub fn contains(&self, method: Method) -> bool {
        self.0 & method.bit() != 0
    }

    /// Number of methods in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Check if no method fired.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Method> for VoteSet {
    fn from_iter<I: IntoIterator<Item = Method>>(iter: I) -> Self {
        let mut set = VoteSet::new();
        for method in iter {
            set.insert(method);
        }
        set
    }
}

impl From<Vec<Method>> for VoteSet {
    fn from(methods: Vec<Method>) -> Self {
        methods.into_iter().collect()
    }
}

impl From<VoteSet> for Vec<Method> {
    fn from(set: VoteSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for VoteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|m| m.display_name()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Read-only input shared by all detectors of a run.
#[derive(Debug, Clone, Copy)]
pub struct DetectorInput<'a> {
    /// Hourly aggregated series.
    pub hourly: &'a HourlySeries,
    /// STL decomposition of `hourly`.
    pub decomposition: &'a Decomposition,
}

/// Per-index output of one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOutput {
    /// Which detector produced this output.
    pub method: Method,
    /// One flag per hourly index.
    pub flags: Vec<bool>,
    /// Non-negative anomaly scores (higher = more anomalous).
    pub scores: Vec<f64>,
    /// Signed scores, when the detector has a notion of direction.
    pub signed_scores: Option<Vec<f64>>,
}

impl DetectorOutput {
    /// Number of indices covered.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Check if the output covers no index.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Indices whose flag is set.
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &flag)| flag)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of flagged indices.
    pub fn flag_count(&self) -> usize {
        self.flags.iter().filter(|&&flag| flag).count()
    }

    /// Check that every per-index vector has `expected` entries.
    pub fn check_len(&self, expected: usize) -> Result<()> {
        let lengths = std::iter::once(self.flags.len())
            .chain(std::iter::once(self.scores.len()))
            .chain(self.signed_scores.as_ref().map(|s| s.len()));
        for got in lengths {
            if got != expected {
                return Err(DetectionError::DimensionMismatch { expected, got });
            }
        }
        Ok(())
    }
}

/// Common contract of the ensemble members.
pub trait Detector: Send + Sync {
    /// Method tag contributed to the vote.
    fn method(&self) -> Method;

    /// Score the input and flag anomalous indices.
    fn detect(&self, input: &DetectorInput<'_>) -> Result<DetectorOutput>;
}
