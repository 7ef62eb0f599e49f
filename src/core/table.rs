//! Raw tabular input supplied by the caller.
//!
//! The table is column-oriented and already typed: the crate does not parse
//! CSV. Timestamp columns may still arrive as text and are parsed during
//! hourly aggregation.

use crate::error::{DetectionError, Result};
use chrono::{DateTime, Utc};

/// A single typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Already-parsed timestamps.
    Timestamps(Vec<Option<DateTime<Utc>>>),
    /// Textual cells (timestamps that still need parsing).
    Text(Vec<Option<String>>),
    /// Numeric cells; `None` and NaN both mean missing.
    Numeric(Vec<Option<f64>>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Timestamps(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    /// Check if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::Timestamps(_) => "timestamp",
            Column::Text(_) => "text",
            Column::Numeric(_) => "numeric",
        }
    }
}

/// A raw table of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<(String, Column)>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, validating that its length matches existing columns.
    ///
    /// A column with an existing name is replaced.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if let Some((_, first)) = self.columns.iter().find(|(n, _)| *n != name) {
            if first.len() != column.len() {
                return Err(DetectionError::DimensionMismatch {
                    expected: first.len(),
                    got: column.len(),
                });
            }
        }
        self.columns.retain(|(n, _)| *n != name);
        self.columns.push((name, column));
        Ok(self)
    }

    /// Build a two-column table from textual timestamps and numeric values.
    pub fn from_text_rows(
        time_column: &str,
        value_column: &str,
        rows: &[(&str, Option<f64>)],
    ) -> Result<Self> {
        let times = rows.iter().map(|(t, _)| Some(t.to_string())).collect();
        let values = rows.iter().map(|(_, v)| *v).collect();
        RawTable::new()
            .with_column(time_column, Column::Text(times))?
            .with_column(value_column, Column::Numeric(values))
    }

    /// Build a two-column table from parsed timestamps and values.
    pub fn from_observations(
        time_column: &str,
        value_column: &str,
        observations: &[(DateTime<Utc>, f64)],
    ) -> Result<Self> {
        let times = observations.iter().map(|(t, _)| Some(*t)).collect();
        let values = observations.iter().map(|(_, v)| Some(*v)).collect();
        RawTable::new()
            .with_column(time_column, Column::Timestamps(times))?
            .with_column(value_column, Column::Numeric(values))
    }

    /// Number of rows (0 for a table without columns).
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| DetectionError::MissingColumn(name.to_string()))
    }

    /// Look up a numeric column by name.
    pub fn numeric_column(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            other => Err(DetectionError::InvalidParameter(format!(
                "column '{}' must be numeric, found {}",
                name,
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn table_builds_from_text_rows() {
        let table = RawTable::from_text_rows(
            "Start Time",
            "Trip Distance",
            &[("2024-01-01 00:10:00", Some(1.5)), ("2024-01-01 00:20:00", None)],
        )
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["Start Time", "Trip Distance"]);
        assert_eq!(
            table.numeric_column("Trip Distance").unwrap(),
            &[Some(1.5), None]
        );
    }

    #[test]
    fn table_rejects_mismatched_column_lengths() {
        let result = RawTable::new()
            .with_column("t", Column::Text(vec![Some("a".to_string())]))
            .unwrap()
            .with_column("v", Column::Numeric(vec![Some(1.0), Some(2.0)]));

        assert_eq!(
            result.unwrap_err(),
            DetectionError::DimensionMismatch {
                expected: 1,
                got: 2
            }
        );
    }

    #[test]
    fn table_replaces_column_with_same_name() {
        let table = RawTable::new()
            .with_column("v", Column::Numeric(vec![Some(1.0)]))
            .unwrap()
            .with_column("v", Column::Numeric(vec![Some(2.0), Some(3.0)]))
            .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["v"]);
    }

    #[test]
    fn table_reports_missing_and_mistyped_columns() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let table = RawTable::from_observations("time", "value", &[(ts, 1.0)]).unwrap();

        assert_eq!(
            table.column("nope").unwrap_err(),
            DetectionError::MissingColumn("nope".to_string())
        );
        assert!(matches!(
            table.numeric_column("time"),
            Err(DetectionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_table_has_no_rows() {
        assert_eq!(RawTable::new().row_count(), 0);
        assert!(Column::Numeric(vec![]).is_empty());
    }
}
