//! Hourly series and the aggregation that produces it from raw rows.

use crate::core::table::{Column, RawTable};
use crate::error::{DetectionError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const SECONDS_PER_HOUR: i64 = 3600;

/// Layouts tried when no explicit timestamp format is configured.
const INFERRED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A uniform hourly series: one summed value per hour that had data.
///
/// Timestamps are hour starts, strictly increasing. Hours without any
/// contributing observation are absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl HourlySeries {
    /// Create a series, validating alignment and ordering.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(DetectionError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(DetectionError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        Ok(Self { timestamps, values })
    }

    /// Consecutive hours starting at `start`, one per value.
    pub fn from_values(start: DateTime<Utc>, values: Vec<f64>) -> Result<Self> {
        let start = floor_to_hour(start)?;
        let timestamps = (0..values.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        Self::new(timestamps, values)
    }

    /// Get the number of hours.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Hour-start timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Aggregated values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Position of an hour start in the series.
    pub fn index_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.timestamps.binary_search(&timestamp).ok()
    }

    /// Index range of hours within `[start, end]` (inclusive on both ends).
    pub fn range_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> std::ops::Range<usize> {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        lo..hi.max(lo)
    }

    /// True when every value is identical (zero variance).
    pub fn is_constant(&self) -> bool {
        match self.values.first() {
            Some(first) => self.values.iter().all(|v| v == first),
            None => false,
        }
    }
}

/// Truncate a timestamp to the top of its hour (UTC).
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let secs = timestamp.timestamp();
    let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).ok_or_else(|| {
        DetectionError::TimestampError(format!("timestamp out of range: {}", timestamp))
    })
}

/// Parse a textual timestamp.
///
/// With an explicit `format` only that layout is accepted. Without one,
/// RFC 3339 is tried first, then a fixed list of common layouts.
pub fn parse_timestamp(text: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(format) = format {
        return NaiveDateTime::parse_from_str(text, format)
            .ok()
            .map(|t| t.and_utc());
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }

    INFERRED_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .map(|t| t.and_utc())
}

/// Resample raw rows into an hourly series by summation.
///
/// Rows with an unparseable or missing timestamp, or a missing value, are
/// dropped. Duplicate timestamps are summed into the same hour.
///
/// # Example
/// ```
/// use anofox_anomaly::core::{aggregate_hourly, RawTable};
///
/// let table = RawTable::from_text_rows(
///     "Start Time",
///     "Trip Distance",
///     &[
///         ("2024-01-01 00:05:00", Some(1.0)),
///         ("2024-01-01 00:55:00", Some(2.0)),
///         ("2024-01-01 02:00:00", Some(4.0)),
///         ("not a date", Some(8.0)),
///     ],
/// )
/// .unwrap();
///
/// let hourly = aggregate_hourly(&table, "Start Time", "Trip Distance", None).unwrap();
/// assert_eq!(hourly.values(), &[3.0, 4.0]);
/// ```
pub fn aggregate_hourly(
    table: &RawTable,
    time_column: &str,
    value_column: &str,
    timestamp_format: Option<&str>,
) -> Result<HourlySeries> {
    let timestamps = resolve_timestamps(table.column(time_column)?, time_column, timestamp_format)?;
    let values = table.numeric_column(value_column)?;

    let mut buckets: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    let mut dropped_timestamps = 0usize;
    let mut dropped_values = 0usize;

    for (timestamp, value) in timestamps.iter().zip(values.iter().copied()) {
        let Some(timestamp) = timestamp else {
            dropped_timestamps += 1;
            continue;
        };
        let Some(value) = value.filter(|v| v.is_finite()) else {
            dropped_values += 1;
            continue;
        };
        let hour = floor_to_hour(*timestamp)?;
        *buckets.entry(hour).or_insert(0.0) += value;
    }

    if dropped_timestamps > 0 || dropped_values > 0 {
        debug!(
            dropped_timestamps,
            dropped_values, "dropped raw rows during hourly aggregation"
        );
    }

    let (timestamps, values): (Vec<_>, Vec<_>) = buckets.into_iter().unzip();
    debug!(rows = table.row_count(), hours = timestamps.len(), "aggregated raw table");
    HourlySeries::new(timestamps, values)
}

fn resolve_timestamps(
    column: &Column,
    name: &str,
    format: Option<&str>,
) -> Result<Vec<Option<DateTime<Utc>>>> {
    match column {
        Column::Timestamps(values) => Ok(values.clone()),
        Column::Text(cells) => Ok(cells
            .iter()
            .map(|cell| cell.as_deref().and_then(|text| parse_timestamp(text, format)))
            .collect()),
        Column::Numeric(_) => Err(DetectionError::InvalidParameter(format!(
            "column '{}' must hold timestamps or text, found numeric",
            name
        ))),
    }
}
