//! Trace adapters
//!
//! This module provides adapters that parse exported trace files and map them
//! to raw point records for the normalizer. Adapters never validate
//! coordinates: unusable values become `None` and are dropped downstream.

mod points;
mod strava;

pub use points::PointListAdapter;
pub use strava::StravaAdapter;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AnalysisError;
use crate::types::RawPoint;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceFormat {
    /// JSON array of `{lat, lon, timestamp}` objects
    Points,
    /// One `{lat, lon, timestamp}` object per line
    Ndjson,
    /// Strava-style activity export with `latlng` and `time` streams
    Strava,
}

impl TraceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceFormat::Points => "points",
            TraceFormat::Ndjson => "ndjson",
            TraceFormat::Strava => "strava",
        }
    }

    /// Adapter that reads this format
    pub fn adapter(&self) -> Box<dyn TraceAdapter> {
        match self {
            TraceFormat::Points => Box::new(PointListAdapter::array()),
            TraceFormat::Ndjson => Box::new(PointListAdapter::ndjson()),
            TraceFormat::Strava => Box::new(StravaAdapter),
        }
    }
}

impl FromStr for TraceFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points" | "json" => Ok(TraceFormat::Points),
            "ndjson" | "jsonl" => Ok(TraceFormat::Ndjson),
            "strava" => Ok(TraceFormat::Strava),
            other => Err(AnalysisError::ParseError(format!(
                "unknown trace format {:?} (expected points, ndjson or strava)",
                other
            ))),
        }
    }
}

/// Trait for trace adapters
pub trait TraceAdapter {
    /// Parse a raw payload into unvalidated point records
    fn parse(&self, raw: &str) -> Result<Vec<RawPoint>, AnalysisError>;
}
