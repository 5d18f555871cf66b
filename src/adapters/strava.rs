//! Strava-style activity adapter
//!
//! Reads activity exports carrying a `start_date` and per-point streams. Both
//! stream layouts are accepted:
//! - keyed: `"streams": {"latlng": [[lat, lon], ...], "time": [0, 5, ...]}`
//!   (each entry may also be an object with a `data` array)
//! - list: `"streams": [{"type": "latlng", "data": [...]}, {"type": "time", "data": [...]}]`
//!
//! `time` values are seconds since `start_date`, or absolute RFC 3339 strings.

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde_json::Value;

use crate::error::AnalysisError;
use crate::types::RawPoint;

use super::TraceAdapter;

/// Strava activity adapter
pub struct StravaAdapter;

impl TraceAdapter for StravaAdapter {
    fn parse(&self, raw: &str) -> Result<Vec<RawPoint>, AnalysisError> {
        let activity: Value = serde_json::from_str(raw)?;

        let start = activity
            .get("start_date")
            .and_then(Value::as_str)
            .ok_or_else(|| AnalysisError::MissingField("start_date".to_string()))?;
        let start = parse_start_date(start)?;

        let streams = activity
            .get("streams")
            .ok_or_else(|| AnalysisError::MissingField("streams".to_string()))?;
        let latlng = stream_data(streams, "latlng")
            .ok_or_else(|| AnalysisError::MissingField("streams.latlng".to_string()))?;
        let time = stream_data(streams, "time")
            .ok_or_else(|| AnalysisError::MissingField("streams.time".to_string()))?;

        if latlng.len() != time.len() {
            warn!(
                "Stream length mismatch (latlng {}, time {}); truncating to the shorter",
                latlng.len(),
                time.len()
            );
        }

        Ok(latlng
            .iter()
            .zip(time)
            .map(|(position, offset)| RawPoint {
                lat: position.get(0).and_then(Value::as_f64),
                lon: position.get(1).and_then(Value::as_f64),
                timestamp: point_time(start, offset),
            })
            .collect())
    }
}

fn parse_start_date(value: &str) -> Result<DateTime<Utc>, AnalysisError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AnalysisError::DateParseError(format!("start_date {:?}: {}", value, e)))
}

/// Look up a stream's data array in either layout
fn stream_data<'a>(streams: &'a Value, kind: &str) -> Option<&'a Vec<Value>> {
    match streams {
        Value::Object(map) => match map.get(kind)? {
            Value::Array(data) => Some(data),
            entry @ Value::Object(_) => entry.get("data")?.as_array(),
            _ => None,
        },
        Value::Array(list) => list
            .iter()
            .find(|s| s.get("type").and_then(Value::as_str) == Some(kind))?
            .get("data")?
            .as_array(),
        _ => None,
    }
}

fn point_time(start: DateTime<Utc>, value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => offset_time(start, value.as_f64()?),
    }
}

fn offset_time(start: DateTime<Utc>, secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    start.checked_add_signed(Duration::milliseconds((secs * 1000.0).round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_keyed_streams() {
        let json = r#"{
            "start_date": "2025-01-01T07:30:00Z",
            "streams": {
                "latlng": [[51.5074, -0.1278], [51.5080, -0.1290], [51.5090, -0.1300]],
                "time": [0, 5, 12.5],
                "distance": [0.0, 80.1, 190.4]
            }
        }"#;

        let points = StravaAdapter.parse(json).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].lat, Some(51.5074));
        assert_eq!(points[0].lon, Some(-0.1278));
        assert_eq!(
            points[0].timestamp,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 7, 30, 0).unwrap())
        );
        assert_eq!(
            points[2].timestamp,
            Some(
                Utc.with_ymd_and_hms(2025, 1, 1, 7, 30, 12).unwrap()
                    + Duration::milliseconds(500)
            )
        );
    }

    #[test]
    fn test_list_streams_with_data_objects() {
        let json = r#"{
            "start_date": "2025-01-01T07:30:00+01:00",
            "streams": [
                {"type": "time", "data": [0, 60]},
                {"type": "latlng", "data": [[10.0, 20.0], [10.1, 20.1]]}
            ]
        }"#;

        let points = StravaAdapter.parse(json).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[1].timestamp,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 6, 31, 0).unwrap())
        );
    }

    #[test]
    fn test_absolute_time_stream() {
        let json = r#"{
            "start_date": "2025-01-01T07:30:00Z",
            "streams": {
                "latlng": [[1.0, 1.0], [2.0, 2.0]],
                "time": ["2025-01-01T08:00:00Z", "garbage"]
            }
        }"#;

        let points = StravaAdapter.parse(json).unwrap();
        assert_eq!(
            points[0].timestamp,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(points[1].timestamp, None);
    }

    #[test]
    fn test_mismatched_lengths_truncate() {
        let json = r#"{
            "start_date": "2025-01-01T07:30:00Z",
            "streams": {
                "latlng": {"data": [[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]},
                "time": {"data": [0, 1]}
            }
        }"#;

        let points = StravaAdapter.parse(json).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_bad_entries_become_none() {
        let json = r#"{
            "start_date": "2025-01-01T07:30:00Z",
            "streams": {
                "latlng": [[1.0], null, [3.0, 3.0]],
                "time": [0, 1, -5]
            }
        }"#;

        let points = StravaAdapter.parse(json).unwrap();
        assert_eq!(points[0].lon, None);
        assert_eq!(points[1].lat, None);
        assert_eq!(points[2].timestamp, None);
    }

    #[test]
    fn test_missing_fields() {
        let no_start = r#"{"streams": {"latlng": [], "time": []}}"#;
        assert!(matches!(
            StravaAdapter.parse(no_start),
            Err(AnalysisError::MissingField(f)) if f == "start_date"
        ));

        let no_time = r#"{"start_date": "2025-01-01T07:30:00Z", "streams": {"latlng": []}}"#;
        assert!(matches!(
            StravaAdapter.parse(no_time),
            Err(AnalysisError::MissingField(f)) if f == "streams.time"
        ));

        let bad_date = r#"{"start_date": "yesterday", "streams": {"latlng": [], "time": []}}"#;
        assert!(matches!(
            StravaAdapter.parse(bad_date),
            Err(AnalysisError::DateParseError(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StravaAdapter.parse("not json"),
            Err(AnalysisError::JsonError(_))
        ));
    }
}
