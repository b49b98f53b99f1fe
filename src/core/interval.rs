//! Data interval resolution
//!
//! A run covers the half-open window `[end - granularity, end)`. The end comes
//! either from the caller or from the scheduler's start-time value.

use crate::domain::{HarborError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Export schedule granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportInterval {
    #[serde(rename = "every 5 minutes")]
    FiveMinutes,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
}

impl ExportInterval {
    pub fn duration(&self) -> Duration {
        match self {
            ExportInterval::FiveMinutes => Duration::minutes(5),
            ExportInterval::Hour => Duration::hours(1),
            ExportInterval::Day => Duration::days(1),
            ExportInterval::Week => Duration::weeks(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportInterval::FiveMinutes => "every 5 minutes",
            ExportInterval::Hour => "hour",
            ExportInterval::Day => "day",
            ExportInterval::Week => "week",
        }
    }
}

impl Default for ExportInterval {
    fn default() -> Self {
        Self::Hour
    }
}

impl fmt::Display for ExportInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "every 5 minutes" => Ok(ExportInterval::FiveMinutes),
            "hour" => Ok(ExportInterval::Hour),
            "day" => Ok(ExportInterval::Day),
            "week" => Ok(ExportInterval::Week),
            other => Err(format!(
                "Invalid interval '{other}'. Must be one of: every 5 minutes, hour, day, week"
            )),
        }
    }
}

/// Half-open `[start, end)` window of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataInterval {
    /// The window of `interval` ending at `end`
    pub fn ending_at(end: DateTime<Utc>, interval: ExportInterval) -> Self {
        Self {
            start: end - interval.duration(),
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// The window of the next scheduled run; its start is this window's end
    pub fn next(&self) -> Self {
        Self {
            start: self.end,
            end: self.end + (self.end - self.start),
        }
    }
}

impl fmt::Display for DataInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// The scheduled start time as handed over by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerValue {
    /// Already a timestamp
    Timestamp(DateTime<Utc>),
    /// Textual timestamp, parsed with [`parse_timestamp`]
    Text(String),
    /// Anything else; always rejected
    Other(Value),
}

impl SchedulerValue {
    /// Interpret a raw scheduler attribute.
    ///
    /// Search attributes arrive as lists, so an array contributes its first
    /// element. An empty array stays [`SchedulerValue::Other`].
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(mut items) if !items.is_empty() => {
                SchedulerValue::from_json(items.swap_remove(0))
            }
            Value::String(text) => SchedulerValue::Text(text),
            other => SchedulerValue::Other(other),
        }
    }
}

impl From<DateTime<Utc>> for SchedulerValue {
    fn from(value: DateTime<Utc>) -> Self {
        SchedulerValue::Timestamp(value)
    }
}

/// Resolve the data interval of a run.
///
/// `explicit_end` wins when present. Otherwise the scheduler value is used.
/// No value at all is a configuration error and an unusable value is a
/// validation error; neither is retryable.
pub fn resolve_data_interval(
    explicit_end: Option<&str>,
    scheduled: Option<SchedulerValue>,
    interval: ExportInterval,
) -> Result<DataInterval> {
    let end = match (explicit_end, scheduled) {
        (Some(text), _) => parse_timestamp(text).map_err(|e| {
            HarborError::Validation(format!("Invalid data_interval_end '{text}': {e}"))
        })?,
        (None, Some(SchedulerValue::Timestamp(ts))) => ts,
        (None, Some(SchedulerValue::Text(text))) => parse_timestamp(&text).map_err(|e| {
            HarborError::Validation(format!("Invalid scheduled start time '{text}': {e}"))
        })?,
        (None, Some(SchedulerValue::Other(value))) => {
            return Err(HarborError::Validation(format!(
                "Expected scheduled start time to be a timestamp or string, got {}",
                json_type_name(&value)
            )));
        }
        (None, None) => {
            return Err(HarborError::Configuration(
                "Expected scheduled start time or an explicit data_interval_end, got neither"
                    .to_string(),
            ));
        }
    };

    Ok(DataInterval::ending_at(end, interval))
}

/// Parse a timestamp in any of the shapes the scheduler and ClickHouse emit.
///
/// Accepts RFC 3339, and naive `YYYY-MM-DD HH:MM:SS[.f]` or
/// `YYYY-MM-DDTHH:MM:SS[.f]` which are read as UTC.
pub fn parse_timestamp(text: &str) -> std::result::Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unrecognized timestamp format '{text}'"))
}

/// Render a timestamp the way ClickHouse `DateTime64(6)` parameters expect
pub fn format_clickhouse_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "empty list",
        Value::Object(_) => "object",
    }
}
