//! geotrace-risk - Location privacy risk analysis for personal GPS traces
//!
//! The engine estimates how much a movement trace reveals about the subject's
//! sensitive places through a deterministic pipeline: point normalization →
//! stay detection → visit patterns → location labeling → risk metrics →
//! score aggregation → recommendations.
//!
//! ## Modules
//!
//! - **Core pipeline**: `normalizer`, `stay`, `patterns`, `labeler`, `metrics`,
//!   `score`, `recommendations`, orchestrated by `pipeline::TraceAnalyzer`
//! - **Ingestion**: `adapters` for point lists and Strava-style exports
//! - **Output**: `encoder` wraps results in a JSON privacy report

pub mod adapters;
pub mod config;
pub mod encoder;
pub mod error;
pub mod geo;
pub mod labeler;
pub mod metrics;
pub mod normalizer;
pub mod patterns;
pub mod pipeline;
pub mod recommendations;
pub mod score;
pub mod stay;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use adapters::{TraceAdapter, TraceFormat};
pub use config::{AnalysisConfig, MetricWeights};
pub use encoder::ReportEncoder;
pub use error::{AnalysisError, MalformedPointError};
pub use pipeline::{analyze_points_json, analyze_strava_json, analyze_trace, TraceAnalyzer};
pub use types::{
    AnalysisResult, Cluster, GpsPoint, LocationLabel, PointRecord, RawPoint, Recommendation,
    RiskMetrics,
};

/// Library version embedded in every report
pub const GEOTRACE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "geotrace-risk";
