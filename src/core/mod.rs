//! Core data structures: the raw input table and the hourly series.

mod table;
mod time_series;

pub use table::{Column, RawTable};
pub use time_series::{aggregate_hourly, floor_to_hour, parse_timestamp, HourlySeries};
