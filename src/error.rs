//! Error types for geotrace-risk

use thiserror::Error;

/// Errors that abort an analysis run or a configuration step
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Insufficient data: {valid} valid points (minimum {required}, {dropped} malformed points dropped)")]
    InsufficientData {
        valid: usize,
        required: usize,
        dropped: usize,
    },

    #[error("Invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Failed to parse trace payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),
}

impl AnalysisError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidConfiguration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reason a single point was rejected during normalization.
///
/// Recovered locally: the point is dropped and normalization continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPointError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("non-finite {0}")]
    NonFinite(&'static str),

    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}
