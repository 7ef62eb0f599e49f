//! End-to-end detection run.
//!
//! raw table → hourly aggregation → STL decomposition → detectors → vote.

use crate::core::{aggregate_hourly, HourlySeries, RawTable};
use crate::detection::{
    DensityConfig, DensityScorer, ResidualConfig, ResidualScorer, SegmentConfig, SegmentScorer,
};
use crate::ensemble::{
    Anomaly, Detector, DetectorInput, DetectorOutput, VotingAggregator, VotingPolicy,
};
use crate::error::{DetectionError, Result};
use crate::seasonality::{Decomposition, STL};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hours on each side of an anomaly shown in its detail window.
pub const DEFAULT_DETAIL_RADIUS_HOURS: i64 = 48;

/// Configuration of a detection run.
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Name of the timestamp column.
    pub time_column: String,
    /// Name of the value column.
    pub value_column: String,
    /// `chrono` format for textual timestamps; inferred when `None`.
    pub timestamp_format: Option<String>,
    /// Seasonal period in hours.
    pub period: usize,
    /// Residual scorer settings.
    pub residual: ResidualConfig,
    /// Density scorer settings.
    pub density: DensityConfig,
    /// Segment scorer settings.
    pub segment: SegmentConfig,
    /// Ensemble policy.
    pub voting: VotingPolicy,
    /// Run the detectors on the rayon pool.
    pub parallel: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            time_column: "Start Time".to_string(),
            value_column: "Trip Distance".to_string(),
            timestamp_format: None,
            period: 24,
            residual: ResidualConfig::default(),
            density: DensityConfig::default(),
            segment: SegmentConfig::default(),
            voting: VotingPolicy::default(),
            parallel: false,
        }
    }
}

impl DetectionConfig {
    /// Set the column names.
    pub fn columns(mut self, time_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        self.time_column = time_column.into();
        self.value_column = value_column.into();
        self
    }

    /// Set the timestamp format.
    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = Some(format.into());
        self
    }

    /// Set the seasonal period.
    pub fn period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Set the ensemble policy.
    pub fn voting(mut self, voting: VotingPolicy) -> Self {
        self.voting = voting;
        self
    }

    /// Run detectors in parallel.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        if self.time_column.is_empty() || self.value_column.is_empty() {
            return Err(DetectionError::InvalidParameter(
                "column names must not be empty".to_string(),
            ));
        }
        if self.period < 2 {
            return Err(DetectionError::InvalidParameter(format!(
                "period must be at least 2, got {}",
                self.period
            )));
        }
        self.residual.validate()?;
        self.density.validate()?;
        self.segment.validate()?;
        self.voting.validate()
    }

    /// The three ensemble members configured for this run.
    pub fn detectors(&self) -> Vec<Box<dyn Detector>> {
        vec![
            Box::new(ResidualScorer::new(self.residual)),
            Box::new(DensityScorer::new(self.density)),
            Box::new(SegmentScorer::new(self.segment)),
        ]
    }
}

/// One hour of the detail view around an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub trend: f64,
    pub seasonal: f64,
    pub residual: f64,
}

/// Output of a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRun {
    /// Voted anomalies in hourly order.
    pub anomalies: Vec<Anomaly>,
    /// The aggregated series the anomalies refer to.
    pub hourly: HourlySeries,
    /// Decomposition of `hourly`.
    pub decomposition: Decomposition,
}

impl DetectionRun {
    /// Hours within `[timestamp - radius, timestamp + radius]`.
    ///
    /// Bounds past the representable date range saturate.
    pub fn detail_window(&self, timestamp: DateTime<Utc>, radius: Duration) -> Vec<DetailPoint> {
        let start = timestamp
            .checked_sub_signed(radius)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = timestamp
            .checked_add_signed(radius)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let range = self.hourly.range_between(start, end);
        let timestamps = self.hourly.timestamps();
        let values = self.hourly.values();

        range
            .map(|i| DetailPoint {
                timestamp: timestamps[i],
                value: values[i],
                trend: self.decomposition.trend[i],
                seasonal: self.decomposition.seasonal[i],
                residual: self.decomposition.residual[i],
            })
            .collect()
    }

    /// Detail window around an anomaly with the default radius.
    pub fn anomaly_detail(&self, anomaly: &Anomaly) -> Vec<DetailPoint> {
        self.detail_window(
            anomaly.timestamp,
            Duration::hours(DEFAULT_DETAIL_RADIUS_HOURS),
        )
    }
}

/// Run the full pipeline on a raw table.
pub fn detect_anomalies(table: &RawTable, config: &DetectionConfig) -> Result<DetectionRun> {
    config.validate()?;
    let hourly = aggregate_hourly(
        table,
        &config.time_column,
        &config.value_column,
        config.timestamp_format.as_deref(),
    )?;
    detect_hourly(hourly, config)
}

/// Run decomposition, detectors and voting on an already aggregated series.
pub fn detect_hourly(hourly: HourlySeries, config: &DetectionConfig) -> Result<DetectionRun> {
    config.validate()?;
    info!(hours = hourly.len(), period = config.period, "starting detection run");

    if hourly.len() < config.period {
        return Err(DetectionError::InsufficientData {
            needed: config.period,
            got: hourly.len(),
        });
    }
    if hourly.is_constant() {
        return Err(DetectionError::ConstantSeries);
    }

    let decomposition = STL::new(config.period).decompose(hourly.values())?;
    debug!(
        seasonal_strength = decomposition.seasonal_strength(),
        trend_strength = decomposition.trend_strength(),
        "decomposition complete"
    );

    let detectors = config.detectors();
    let input = DetectorInput {
        hourly: &hourly,
        decomposition: &decomposition,
    };
    let outputs = run_detectors(&detectors, &input, config.parallel)?;

    let anomalies = VotingAggregator::new(config.voting).aggregate(hourly.timestamps(), &outputs)?;
    info!(anomalies = anomalies.len(), "detection run complete");

    Ok(DetectionRun {
        anomalies,
        hourly,
        decomposition,
    })
}

/// Invoke every detector on the same input.
///
/// Any detector error fails the whole run, as does an output tagged with a
/// method other than the detector's own. Output order follows `detectors` in
/// both modes.
pub fn run_detectors(
    detectors: &[Box<dyn Detector>],
    input: &DetectorInput<'_>,
    parallel: bool,
) -> Result<Vec<DetectorOutput>> {
    let outputs: Vec<DetectorOutput> = if parallel {
        detectors
            .par_iter()
            .map(|detector| run_detector(detector.as_ref(), input))
            .collect::<Result<_>>()?
    } else {
        detectors
            .iter()
            .map(|detector| run_detector(detector.as_ref(), input))
            .collect::<Result<_>>()?
    };

    for output in &outputs {
        output.check_len(input.hourly.len())?;
        debug!(method = %output.method, flagged = output.flag_count(), "detector finished");
    }

    Ok(outputs)
}

fn run_detector(detector: &dyn Detector, input: &DetectorInput<'_>) -> Result<DetectorOutput> {
    let output = detector.detect(input)?;
    if output.method != detector.method() {
        return Err(DetectionError::ComputationError(format!(
            "{} detector reported its output as {}",
            detector.method(),
            output.method
        )));
    }
    Ok(output)
}
