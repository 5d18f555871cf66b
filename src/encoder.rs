//! Report encoding
//!
//! This module wraps an analysis result in a JSON report envelope with producer
//! metadata and the computation time. The result itself is copied unchanged.

use crate::error::AnalysisError;
use crate::types::{AnalysisResult, PrivacyReport, ReportProducer};
use crate::{GEOTRACE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Report encoder for producing JSON envelopes
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode an analysis result into a report
    pub fn encode(&self, result: &AnalysisResult) -> PrivacyReport {
        PrivacyReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: GEOTRACE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            risk_score: result.risk_score(),
            sensitive_locations: result.sensitive_locations(),
            result: result.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, result: &AnalysisResult) -> Result<String, AnalysisError> {
        let report = self.encode(result);
        serde_json::to_string_pretty(&report).map_err(AnalysisError::JsonError)
    }
}
