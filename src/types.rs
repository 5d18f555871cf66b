//! Core types for the geotrace-risk pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw point records, the normalized point arena, stay clusters,
//! risk metrics, recommendations and the final analysis result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::MalformedPointError;

/// Anything that exposes a latitude, longitude and timestamp.
///
/// Fields are optional so that records with missing values can still reach the
/// normalizer, which drops them.
pub trait PointRecord {
    fn lat(&self) -> Option<f64>;
    fn lon(&self) -> Option<f64>;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

/// Unvalidated point as produced by an ingestion adapter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawPoint {
    pub fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            timestamp: Some(timestamp),
        }
    }
}

impl PointRecord for RawPoint {
    fn lat(&self) -> Option<f64> {
        self.lat
    }

    fn lon(&self) -> Option<f64> {
        self.lon
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// A validated GPS fix. Immutable once created.
///
/// Deserialization goes through `RawPoint` and the same range checks as `new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GpsPoint {
    lat: f64,
    lon: f64,
    timestamp: DateTime<Utc>,
}

impl GpsPoint {
    /// Validate coordinates and build a point
    pub fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Result<Self, MalformedPointError> {
        if !lat.is_finite() {
            return Err(MalformedPointError::NonFinite("latitude"));
        }
        if !lon.is_finite() {
            return Err(MalformedPointError::NonFinite("longitude"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(MalformedPointError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(MalformedPointError::LongitudeOutOfRange(lon));
        }
        Ok(Self {
            lat,
            lon,
            timestamp,
        })
    }

    /// Validate an arbitrary record
    pub fn from_record<R: PointRecord + ?Sized>(record: &R) -> Result<Self, MalformedPointError> {
        let lat = record
            .lat()
            .ok_or(MalformedPointError::MissingField("latitude"))?;
        let lon = record
            .lon()
            .ok_or(MalformedPointError::MissingField("longitude"))?;
        let timestamp = record
            .timestamp()
            .ok_or(MalformedPointError::MissingField("timestamp"))?;
        Self::new(lat, lon, timestamp)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl TryFrom<RawPoint> for GpsPoint {
    type Error = MalformedPointError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        Self::from_record(&raw)
    }
}

impl PointRecord for GpsPoint {
    fn lat(&self) -> Option<f64> {
        Some(self.lat)
    }

    fn lon(&self) -> Option<f64> {
        Some(self.lon)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Time-ordered, immutable store of validated points.
///
/// Clusters reference points by index into this sequence. Serialized as a
/// plain array and re-sorted when read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<GpsPoint>", into = "Vec<GpsPoint>")]
pub struct PointSequence {
    points: Vec<GpsPoint>,
}

impl PointSequence {
    /// Build a sequence, stable-sorting by timestamp
    pub fn from_points(mut points: Vec<GpsPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GpsPoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GpsPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[GpsPoint] {
        &self.points
    }

    /// Median gap between consecutive fixes in seconds, `None` below two points
    pub fn median_interval_secs(&self) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }
        let mut gaps: Vec<f64> = self
            .points
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
            .collect();
        gaps.sort_by(f64::total_cmp);
        let mid = gaps.len() / 2;
        if gaps.len() % 2 == 0 {
            Some((gaps[mid - 1] + gaps[mid]) / 2.0)
        } else {
            Some(gaps[mid])
        }
    }
}

impl From<Vec<GpsPoint>> for PointSequence {
    fn from(points: Vec<GpsPoint>) -> Self {
        Self::from_points(points)
    }
}

impl From<PointSequence> for Vec<GpsPoint> {
    fn from(sequence: PointSequence) -> Self {
        sequence.points
    }
}

impl std::ops::Index<usize> for PointSequence {
    type Output = GpsPoint;

    fn index(&self, index: usize) -> &GpsPoint {
        &self.points[index]
    }
}

/// Semantic label assigned to a stay cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationLabel {
    Home,
    Work,
    Frequent,
    Rare,
    Unknown,
}

impl LocationLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationLabel::Home => "home",
            LocationLabel::Work => "work",
            LocationLabel::Frequent => "frequent",
            LocationLabel::Rare => "rare",
            LocationLabel::Unknown => "unknown",
        }
    }

    /// Home and work are the places that identify a person outright
    pub fn is_sensitive(&self) -> bool {
        matches!(self, LocationLabel::Home | LocationLabel::Work)
    }
}

/// A recurring stay: points grouped around one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Sequential id in first-visit order
    pub id: usize,
    /// Running mean of member coordinates
    pub centroid: Coordinate,
    /// Indices into the normalized point sequence
    pub member_indices: BTreeSet<usize>,
    /// Number of member points
    pub visit_count: u32,
    /// Member count per local hour of day
    pub time_histogram: [u32; 24],
    /// Member count per local weekday (0 = Monday)
    pub weekday_histogram: [u32; 7],
    /// Distinct local calendar days with at least one member
    pub distinct_days: u32,
    /// Earliest member timestamp
    pub first_seen: Option<DateTime<Utc>>,
    /// Latest member timestamp
    pub last_seen: Option<DateTime<Utc>>,
    /// Largest member distance from the centroid (meters)
    pub radius_m: f64,
    pub label: LocationLabel,
    /// Label confidence (0-1)
    pub confidence: f64,
}

impl Cluster {
    /// Create an empty, unlabeled cluster
    pub fn new(id: usize, centroid: Coordinate) -> Self {
        Self {
            id,
            centroid,
            member_indices: BTreeSet::new(),
            visit_count: 0,
            time_histogram: [0; 24],
            weekday_histogram: [0; 7],
            distinct_days: 0,
            first_seen: None,
            last_seen: None,
            radius_m: 0.0,
            label: LocationLabel::Unknown,
            confidence: 0.0,
        }
    }

    /// Fraction of visits falling in the given local hours
    pub fn hour_fraction(&self, hours: &[usize]) -> f64 {
        if self.visit_count == 0 {
            return 0.0;
        }
        let hits: u32 = hours
            .iter()
            .filter_map(|h| self.time_histogram.get(*h))
            .sum();
        hits as f64 / self.visit_count as f64
    }

    /// Fraction of visits falling on the given weekdays (0 = Monday)
    pub fn weekday_fraction(&self, days: &[usize]) -> f64 {
        if self.visit_count == 0 {
            return 0.0;
        }
        let hits: u32 = days
            .iter()
            .filter_map(|d| self.weekday_histogram.get(*d))
            .sum();
        hits as f64 / self.visit_count as f64
    }
}

/// Privacy risk metrics for one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Routine regularity across days (0-1)
    pub consistency: f64,
    /// Distinctiveness of the place/time pattern (0-1)
    pub uniqueness: f64,
    /// Share of clustered visits at home or work (0-1)
    pub exposure: f64,
    /// Weighted combination (0-100)
    pub overall_score: u8,
}

/// Metric a recommendation can point back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Consistency,
    Uniqueness,
    Exposure,
    OverallScore,
}

/// What caused a recommendation to be emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationTrigger {
    Cluster { cluster_id: usize },
    Clusters { cluster_ids: Vec<usize> },
    Metric { metric: MetricKind },
    SamplingRate { median_interval_secs: f64 },
}

/// A redaction suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    /// Higher is more urgent
    pub priority: u32,
    pub triggered_by: RecommendationTrigger,
}

/// Bookkeeping about the trace that was analyzed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Records handed to the normalizer
    pub input_points: usize,
    /// Records that passed validation
    pub valid_points: usize,
    /// Records dropped as malformed
    pub dropped_points: usize,
    /// Points kept after down-sampling
    pub retained_points: usize,
    /// Down-sampling stride (1 = no down-sampling)
    pub downsample_stride: usize,
    /// Distinct local calendar days covered by the trace
    pub total_days_observed: u32,
    /// Points not assigned to any stay
    pub transit_points: usize,
    /// Median gap between consecutive fixes (seconds)
    pub median_interval_secs: Option<f64>,
}

/// Home or work location as exposed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveLocation {
    pub cluster_id: usize,
    pub label: LocationLabel,
    pub lat: f64,
    pub lon: f64,
    pub confidence: f64,
    pub visit_count: u32,
}

/// Complete output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Stay clusters in first-visit order
    pub clusters: Vec<Cluster>,
    pub metrics: RiskMetrics,
    /// Highest priority first
    pub recommendations: Vec<Recommendation>,
    pub summary: TraceSummary,
}

impl AnalysisResult {
    pub fn risk_score(&self) -> u8 {
        self.metrics.overall_score
    }

    /// Clusters labeled home or work
    pub fn sensitive_locations(&self) -> Vec<SensitiveLocation> {
        self.clusters
            .iter()
            .filter(|c| c.label.is_sensitive())
            .map(|c| SensitiveLocation {
                cluster_id: c.id,
                label: c.label,
                lat: c.centroid.lat,
                lon: c.centroid.lon,
                confidence: c.confidence,
                visit_count: c.visit_count,
            })
            .collect()
    }

    /// First cluster carrying `label`
    pub fn cluster_with_label(&self, label: LocationLabel) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.label == label)
    }
}

/// Producer metadata stamped on every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report envelope around one analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub risk_score: u8,
    pub sensitive_locations: Vec<SensitiveLocation>,
    pub result: AnalysisResult,
}
