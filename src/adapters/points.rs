//! Plain point list adapter
//!
//! Reads `{lat, lon, timestamp}` records from a JSON array or NDJSON. Common
//! key aliases are accepted (`latitude`, `lng`, `longitude`, `time`);
//! timestamps may be RFC 3339 strings or Unix seconds.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::AnalysisError;
use crate::types::RawPoint;

use super::TraceAdapter;

const LAT_KEYS: [&str; 2] = ["lat", "latitude"];
const LON_KEYS: [&str; 3] = ["lon", "lng", "longitude"];
const TIME_KEYS: [&str; 2] = ["timestamp", "time"];

/// Point list adapter
pub struct PointListAdapter {
    ndjson: bool,
}

impl PointListAdapter {
    /// Read a single JSON array
    pub fn array() -> Self {
        Self { ndjson: false }
    }

    /// Read one JSON object per line
    pub fn ndjson() -> Self {
        Self { ndjson: true }
    }

    fn parse_array(raw: &str) -> Result<Vec<RawPoint>, AnalysisError> {
        let value: Value = serde_json::from_str(raw)?;
        let records = value.as_array().ok_or_else(|| {
            AnalysisError::ParseError("expected a JSON array of points".to_string())
        })?;
        Ok(records.iter().map(record_from_value).collect())
    }

    fn parse_ndjson(raw: &str) -> Result<Vec<RawPoint>, AnalysisError> {
        let mut points = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                AnalysisError::ParseError(format!("line {}: {}", line_no + 1, e))
            })?;
            points.push(record_from_value(&value));
        }
        Ok(points)
    }
}

impl TraceAdapter for PointListAdapter {
    fn parse(&self, raw: &str) -> Result<Vec<RawPoint>, AnalysisError> {
        if self.ndjson {
            Self::parse_ndjson(raw)
        } else {
            Self::parse_array(raw)
        }
    }
}

/// Map one JSON record to a raw point; anything unusable becomes `None`
fn record_from_value(value: &Value) -> RawPoint {
    RawPoint {
        lat: first_key(value, &LAT_KEYS).and_then(Value::as_f64),
        lon: first_key(value, &LON_KEYS).and_then(Value::as_f64),
        timestamp: first_key(value, &TIME_KEYS).and_then(parse_timestamp),
    }
}

fn first_key<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
        }
        _ => None,
    }
}
