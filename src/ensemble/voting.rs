//! Vote aggregation over detector outputs.

use super::{DetectorOutput, Method, VoteSet};
use crate::error::{DetectionError, Result};
use crate::utils::stats::round_to;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Anomaly type label, serialized by its capitalized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    /// Unusual given the seasonal context.
    Contextual,
    /// Part of a structural change.
    Collective,
    /// Isolated unusual value.
    Point,
    /// Residual far above the seasonal expectation.
    Spike,
    /// Residual far below the seasonal expectation.
    Drop,
    /// Level shift at a change point.
    Shift,
}

impl AnomalyType {
    /// Capitalized type name.
    pub fn name(&self) -> &'static str {
        match self {
            AnomalyType::Contextual => "Contextual",
            AnomalyType::Collective => "Collective",
            AnomalyType::Point => "Point",
            AnomalyType::Spike => "Spike",
            AnomalyType::Drop => "Drop",
            AnomalyType::Shift => "Shift",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How vote sets are turned into type labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelingScheme {
    /// changepoint → Collective, else zscore → Contextual, else Point.
    #[default]
    Priority,
    /// zscore → Spike/Drop by residual sign, else changepoint → Shift, else Point.
    Directional,
}

/// Ensemble policy: how many votes are needed and how anomalies are labeled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingPolicy {
    /// Minimum number of agreeing methods (1 to 3).
    pub vote_threshold: usize,
    /// Type labeling scheme.
    pub labeling: LabelingScheme,
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self {
            vote_threshold: 2,
            labeling: LabelingScheme::Priority,
        }
    }
}

impl VotingPolicy {
    /// Set the vote threshold.
    pub fn vote_threshold(mut self, threshold: usize) -> Self {
        self.vote_threshold = threshold;
        self
    }

    /// Set the labeling scheme.
    pub fn labeling(mut self, labeling: LabelingScheme) -> Self {
        self.labeling = labeling;
        self
    }

    /// Reject thresholds outside `1..=3`.
    pub fn validate(&self) -> Result<()> {
        if !(1..=Method::ALL.len()).contains(&self.vote_threshold) {
            return Err(DetectionError::InvalidParameter(format!(
                "vote_threshold must be between 1 and {}, got {}",
                Method::ALL.len(),
                self.vote_threshold
            )));
        }
        Ok(())
    }

    /// Label a vote set; `signed_residual` is the standardized residual at
    /// the same index, if available.
    pub fn classify(&self, votes: VoteSet, signed_residual: Option<f64>) -> AnomalyType {
        match self.labeling {
            LabelingScheme::Priority => {
                if votes.contains(Method::ChangePoint) {
                    AnomalyType::Collective
                } else if votes.contains(Method::ZScore) {
                    AnomalyType::Contextual
                } else {
                    AnomalyType::Point
                }
            }
            LabelingScheme::Directional => {
                if votes.contains(Method::ZScore) {
                    match signed_residual {
                        Some(z) if z >= 0.0 => AnomalyType::Spike,
                        Some(_) => AnomalyType::Drop,
                        None => AnomalyType::Contextual,
                    }
                } else if votes.contains(Method::ChangePoint) {
                    AnomalyType::Shift
                } else {
                    AnomalyType::Point
                }
            }
        }
    }
}

/// A voted anomaly at one hourly timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Start of the anomalous hour.
    pub timestamp: DateTime<Utc>,
    /// Type label.
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    /// Fraction of methods that agreed, rounded to two decimals.
    pub confidence: f64,
    /// Methods that fired.
    pub methods: VoteSet,
}

impl Anomaly {
    /// Display label, e.g. "Contextual anomaly".
    pub fn label(&self) -> String {
        format!("{} anomaly", self.kind)
    }

    /// Confidence as a truncated integer percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0 + 1e-9) as u32
    }
}

/// Merges per-method flags into a deduplicated anomaly list.
#[derive(Debug, Clone, Default)]
pub struct VotingAggregator {
    policy: VotingPolicy,
}

impl VotingAggregator {
    pub fn new(policy: VotingPolicy) -> Self {
        Self { policy }
    }

    /// The policy in effect.
    pub fn policy(&self) -> &VotingPolicy {
        &self.policy
    }

    /// Confidence for a given number of votes.
    pub fn confidence(votes: usize) -> f64 {
        round_to(votes as f64 / Method::ALL.len() as f64, 2)
    }

    /// Vote set at every index.
    pub fn votes(&self, len: usize, outputs: &[DetectorOutput]) -> Result<Vec<VoteSet>> {
        let mut votes = vec![VoteSet::new(); len];
        for output in outputs {
            output.check_len(len)?;
            for (set, &flag) in votes.iter_mut().zip(output.flags.iter()) {
                if flag {
                    set.insert(output.method);
                }
            }
        }
        Ok(votes)
    }

    /// Produce anomalies in timestamp order; the first anomaly for a
    /// timestamp wins.
    pub fn aggregate(
        &self,
        timestamps: &[DateTime<Utc>],
        outputs: &[DetectorOutput],
    ) -> Result<Vec<Anomaly>> {
        self.policy.validate()?;
        let votes = self.votes(timestamps.len(), outputs)?;

        let signed_residuals = outputs
            .iter()
            .find(|o| o.method == Method::ZScore)
            .and_then(|o| o.signed_scores.as_deref());

        let mut seen = HashSet::new();
        let mut anomalies = Vec::new();

        for (i, (&timestamp, &set)) in timestamps.iter().zip(votes.iter()).enumerate() {
            if set.len() < self.policy.vote_threshold || !seen.insert(timestamp) {
                continue;
            }
            let kind = self
                .policy
                .classify(set, signed_residuals.map(|scores| scores[i]));
            anomalies.push(Anomaly {
                timestamp,
                kind,
                confidence: Self::confidence(set.len()),
                methods: set,
            });
        }

        debug!(
            candidates = timestamps.len(),
            anomalies = anomalies.len(),
            vote_threshold = self.policy.vote_threshold,
            "votes aggregated"
        );

        Ok(anomalies)
    }
}
