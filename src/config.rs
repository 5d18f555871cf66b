//! Analysis configuration
//!
//! One value object built once per run, validated before any point is
//! processed, and passed by reference through every stage.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Tolerance used when checking that metric weights sum to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Largest accepted UTC offset in either direction (18 hours)
const MAX_UTC_OFFSET_MINUTES: u32 = 18 * 60;

/// Weights used by the score aggregator; a missing weight takes its default
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub consistency: f64,
    pub uniqueness: f64,
    pub exposure: f64,
}

impl Default for MetricWeights {
    /// Exposure is weighted highest: identifying home/work is the primary leak
    fn default() -> Self {
        Self {
            consistency: 0.3,
            uniqueness: 0.3,
            exposure: 0.4,
        }
    }
}

impl MetricWeights {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("metric_weights.consistency", self.consistency),
            ("metric_weights.uniqueness", self.uniqueness),
            ("metric_weights.exposure", self.exposure),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::invalid_config(
                    name,
                    format!("weight must be a non-negative number, got {}", value),
                ));
            }
        }

        let sum = self.consistency + self.uniqueness + self.exposure;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnalysisError::invalid_config(
                "metric_weights",
                format!("weights must sum to 1, got {}", sum),
            ));
        }
        Ok(())
    }
}

/// Thresholds for the home/work/frequent labeling rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingThresholds {
    pub home_min_days: u32,
    /// Minimum share of visits between 22:00 and 06:00
    pub home_night_fraction: f64,
    pub work_min_days: u32,
    /// Minimum share of visits on Monday-Friday
    pub work_weekday_fraction: f64,
    /// Minimum share of visits between 09:00 and 17:00
    pub work_daytime_fraction: f64,
}

impl Default for LabelingThresholds {
    fn default() -> Self {
        Self {
            home_min_days: 3,
            home_night_fraction: 0.5,
            work_min_days: 3,
            work_weekday_fraction: 0.8,
            work_daytime_fraction: 0.5,
        }
    }
}

/// Thresholds that decide which recommendations fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    pub home_confidence: f64,
    pub work_confidence: f64,
    /// Radius suggested for trimming around home/work (meters)
    pub trim_radius_m: f64,
    /// Minutes suggested for trimming at the start/end of trips
    pub trim_minutes: u32,
    /// More RARE clusters than this triggers the generalization advice
    pub rare_cluster_count: usize,
    /// Share of non-work visits on weekends that triggers weekend exclusion
    pub weekend_fraction: f64,
    /// Median sampling interval below this triggers resolution advice (seconds)
    pub min_sampling_interval_secs: f64,
    /// Overall score at or above this triggers the aggregate-only advice
    pub high_risk_score: u8,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            home_confidence: 0.5,
            work_confidence: 0.5,
            trim_radius_m: 200.0,
            trim_minutes: 10,
            rare_cluster_count: 3,
            weekend_fraction: 0.4,
            min_sampling_interval_secs: 60.0,
            high_risk_score: 70,
        }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum distance for a point to join a stay (meters)
    pub cluster_distance_threshold_m: f64,
    /// Minimum time spent near one position to count as a stay (minutes)
    pub cluster_min_dwell_minutes: f64,
    /// Fewer valid points than this aborts the run
    pub min_points_required: usize,
    /// Down-sample when the trace is longer than this; `None` disables
    pub downsample_ceiling: Option<usize>,
    /// Visits needed for a FREQUENT label
    pub frequent_visit_threshold: u32,
    pub metric_weights: MetricWeights,
    /// Offset applied before computing local hours, weekdays and days
    pub utc_offset_minutes: i32,
    pub labeling: LabelingThresholds,
    pub recommendations: RecommendationThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cluster_distance_threshold_m: 50.0,
            cluster_min_dwell_minutes: 5.0,
            min_points_required: 10,
            downsample_ceiling: Some(50_000),
            frequent_visit_threshold: 5,
            metric_weights: MetricWeights::default(),
            utc_offset_minutes: 0,
            labeling: LabelingThresholds::default(),
            recommendations: RecommendationThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::invalid_config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fixed offset used for local hours, weekdays and calendar days
    pub fn local_offset(&self) -> Result<FixedOffset, AnalysisError> {
        let minutes = self.utc_offset_minutes;
        if minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(AnalysisError::invalid_config(
                "utc_offset_minutes",
                format!("offset {} is beyond 18 hours", minutes),
            ));
        }
        FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            AnalysisError::invalid_config(
                "utc_offset_minutes",
                format!("offset {} is out of range", minutes),
            )
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every threshold and the weight set
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.cluster_distance_threshold_m.is_finite() || self.cluster_distance_threshold_m <= 0.0
        {
            return Err(AnalysisError::invalid_config(
                "cluster_distance_threshold_m",
                format!("must be positive, got {}", self.cluster_distance_threshold_m),
            ));
        }
        if !self.cluster_min_dwell_minutes.is_finite() || self.cluster_min_dwell_minutes < 0.0 {
            return Err(AnalysisError::invalid_config(
                "cluster_min_dwell_minutes",
                format!("must be non-negative, got {}", self.cluster_min_dwell_minutes),
            ));
        }
        if self.min_points_required == 0 {
            return Err(AnalysisError::invalid_config(
                "min_points_required",
                "must be at least 1",
            ));
        }
        if let Some(ceiling) = self.downsample_ceiling {
            if ceiling < self.min_points_required {
                return Err(AnalysisError::invalid_config(
                    "downsample_ceiling",
                    format!(
                        "ceiling {} is below min_points_required {}",
                        ceiling, self.min_points_required
                    ),
                ));
            }
        }
        if self.frequent_visit_threshold == 0 {
            return Err(AnalysisError::invalid_config(
                "frequent_visit_threshold",
                "must be at least 1",
            ));
        }
        self.local_offset()?;

        self.metric_weights.validate()?;

        for (name, value) in [
            ("labeling.home_night_fraction", self.labeling.home_night_fraction),
            ("labeling.work_weekday_fraction", self.labeling.work_weekday_fraction),
            ("labeling.work_daytime_fraction", self.labeling.work_daytime_fraction),
            ("recommendations.home_confidence", self.recommendations.home_confidence),
            ("recommendations.work_confidence", self.recommendations.work_confidence),
            ("recommendations.weekend_fraction", self.recommendations.weekend_fraction),
        ] {
            check_fraction(name, value)?;
        }

        if !self.recommendations.trim_radius_m.is_finite() || self.recommendations.trim_radius_m <= 0.0
        {
            return Err(AnalysisError::invalid_config(
                "recommendations.trim_radius_m",
                "must be positive",
            ));
        }
        if !self.recommendations.min_sampling_interval_secs.is_finite()
            || self.recommendations.min_sampling_interval_secs < 0.0
        {
            return Err(AnalysisError::invalid_config(
                "recommendations.min_sampling_interval_secs",
                "must be non-negative",
            ));
        }
        if self.recommendations.high_risk_score > 100 {
            return Err(AnalysisError::invalid_config(
                "recommendations.high_risk_score",
                "must be at most 100",
            ));
        }

        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<(), AnalysisError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AnalysisError::invalid_config(
            name,
            format!("must be within [0, 1], got {}", value),
        ));
    }
    Ok(())
}
