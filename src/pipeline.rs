//! Pipeline orchestration
//!
//! This module provides the public API for geotrace-risk.
//! It runs the full analysis from raw point records to an `AnalysisResult`.

use log::info;

use crate::adapters::{PointListAdapter, StravaAdapter, TraceAdapter, TraceFormat};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::labeler::LocationLabeler;
use crate::metrics::RiskMetricEngine;
use crate::normalizer::PointNormalizer;
use crate::patterns::PatternExtractor;
use crate::recommendations::{RecommendationGenerator, RecommendationInput};
use crate::score;
use crate::stay::StayDetector;
use crate::types::{AnalysisResult, PointRecord, RawPoint, TraceSummary};

/// Analyze point records with a one-off analyzer.
///
/// # Example
/// ```ignore
/// let result = analyze_trace(&records, &AnalysisConfig::default())?;
/// println!("risk {}/100", result.risk_score());
/// ```
pub fn analyze_trace<R: PointRecord>(
    records: &[R],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    TraceAnalyzer::new(config.clone())?.analyze(records)
}

/// Analyze a JSON array of `{lat, lon, timestamp}` objects.
pub fn analyze_points_json(
    raw_json: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let analyzer = TraceAnalyzer::new(config.clone())?;
    analyzer.analyze_with_adapter(&PointListAdapter::array(), raw_json)
}

/// Analyze a Strava-style activity export.
pub fn analyze_strava_json(
    raw_json: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let analyzer = TraceAnalyzer::new(config.clone())?;
    analyzer.analyze_with_adapter(&StravaAdapter, raw_json)
}

/// Reusable analyzer holding one validated configuration.
///
/// Holds no per-run state, so a single analyzer can serve concurrent runs.
pub struct TraceAnalyzer {
    config: AnalysisConfig,
    stay_detector: StayDetector,
    pattern_extractor: PatternExtractor,
    labeler: LocationLabeler,
    metric_engine: RiskMetricEngine,
    recommendation_generator: RecommendationGenerator,
}

impl TraceAnalyzer {
    /// Validate the configuration and build every stage from it
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            stay_detector: StayDetector::new(&config),
            pattern_extractor: PatternExtractor::new(&config)?,
            labeler: LocationLabeler::new(&config),
            metric_engine: RiskMetricEngine::new(config.frequent_visit_threshold),
            recommendation_generator: RecommendationGenerator::new(config.recommendations),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis over raw records.
    ///
    /// Pipeline stages:
    /// 1. PointNormalizer - Validate, order, down-sample
    /// 2. StayDetector - Dwell segmentation and clustering
    /// 3. PatternExtractor - Hour/weekday histograms and day counts
    /// 4. LocationLabeler - Home/work/frequent/rare labels
    /// 5. RiskMetricEngine + score - Sub-metrics and overall score
    /// 6. RecommendationGenerator - Prioritized redaction advice
    pub fn analyze<R: PointRecord>(&self, records: &[R]) -> Result<AnalysisResult, AnalysisError> {
        // Stage 1: Normalize
        let trace = PointNormalizer::normalize(records, &self.config)?;
        let sequence = &trace.sequence;

        // Stage 2: Detect stays
        let detection = self.stay_detector.detect(sequence);

        // Stage 3: Visit patterns
        let clusters = self.pattern_extractor.extract(detection.clusters, sequence);
        let total_days_observed = self.pattern_extractor.total_days(sequence);

        // Stage 4: Labels
        let clusters = self.labeler.label(clusters);

        // Stage 5: Metrics and score
        let values = self.metric_engine.compute(&clusters, total_days_observed);
        let metrics = score::risk_metrics(&values, &self.config.metric_weights);

        // Stage 6: Recommendations
        let median_interval_secs = sequence.median_interval_secs();
        let recommendations = self.recommendation_generator.generate(&RecommendationInput {
            clusters: &clusters,
            metrics: &metrics,
            median_interval_secs,
        });

        let summary = TraceSummary {
            input_points: trace.report.input_points,
            valid_points: trace.report.valid_points,
            dropped_points: trace.report.dropped_points,
            retained_points: trace.report.retained_points,
            downsample_stride: trace.report.downsample_stride,
            total_days_observed,
            transit_points: detection.transit_indices.len(),
            median_interval_secs,
        };

        info!(
            "Analysis complete: {} clusters, risk score {}, {} recommendations",
            clusters.len(),
            metrics.overall_score,
            recommendations.len()
        );

        Ok(AnalysisResult {
            clusters,
            metrics,
            recommendations,
            summary,
        })
    }

    /// Parse a payload in the given format and analyze it
    pub fn analyze_json(
        &self,
        raw: &str,
        format: TraceFormat,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_adapter(format.adapter().as_ref(), raw)
    }

    fn analyze_with_adapter(
        &self,
        adapter: &dyn TraceAdapter,
        raw: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let records: Vec<RawPoint> = adapter.parse(raw)?;
        self.analyze(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricWeights;
    use crate::geo::offset_m;
    use crate::metrics::MetricValues;
    use crate::recommendations::PRIORITY_HOME;
    use crate::types::{Coordinate, LocationLabel, RecommendationTrigger};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    const HOME: Coordinate = Coordinate {
        lat: 52.52,
        lon: 13.405,
    };

    fn day_start(day: i64) -> DateTime<Utc> {
        // Monday 15 Jan 2024
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap() + Duration::days(day)
    }

    /// 500 points: 10 nights of 40 fixes at home (22:00-04:30, 10 minutes
    /// apart, jitter under 15 m) plus 10 daytime one-off stops per day, each
    /// at least 100 m from every other stop and 1 km from home
    fn home_scenario() -> Vec<RawPoint> {
        let mut points = Vec::new();
        for day in 0..10i64 {
            for stop in 0..10i64 {
                let k = (day * 10 + stop) as f64;
                let coord = offset_m(HOME, 1000.0 + k * 100.0, 0.0);
                let ts = day_start(day) + Duration::hours(9 + stop);
                points.push(RawPoint::new(coord.lat, coord.lon, ts));
            }
            let night = day_start(day) + Duration::hours(22);
            for i in 0..40i64 {
                let north = ((i % 5) as f64 - 2.0) * 5.0;
                let east = ((i % 3) as f64 - 1.0) * 5.0;
                let coord = offset_m(HOME, north, east);
                points.push(RawPoint::new(
                    coord.lat,
                    coord.lon,
                    night + Duration::minutes(i * 10),
                ));
            }
        }
        points
    }

    /// Fixes 10 minutes apart, each 100 m from the previous one
    fn scattered(n: usize) -> Vec<RawPoint> {
        let start = day_start(0) + Duration::hours(8);
        (0..n)
            .map(|i| {
                let coord = offset_m(HOME, i as f64 * 100.0, 0.0);
                RawPoint::new(coord.lat, coord.lon, start + Duration::minutes(i as i64 * 10))
            })
            .collect()
    }

    fn analyzer() -> TraceAnalyzer {
        TraceAnalyzer::new(AnalysisConfig::default()).unwrap()
    }

    fn assert_partition(result: &AnalysisResult) {
        let mut seen = BTreeSet::new();
        for cluster in &result.clusters {
            assert_eq!(cluster.visit_count as usize, cluster.member_indices.len());
            assert_eq!(cluster.time_histogram.iter().sum::<u32>(), cluster.visit_count);
            assert_eq!(cluster.weekday_histogram.iter().sum::<u32>(), cluster.visit_count);
            for &index in &cluster.member_indices {
                assert!(index < result.summary.retained_points);
                assert!(seen.insert(index), "index {index} in two clusters");
            }
        }
        assert_eq!(
            seen.len() + result.summary.transit_points,
            result.summary.retained_points
        );
    }

    fn assert_bounds(result: &AnalysisResult) {
        let m = &result.metrics;
        for value in [m.consistency, m.uniqueness, m.exposure] {
            assert!((0.0..=1.0).contains(&value), "metric {value} out of range");
        }
        assert!(m.overall_score <= 100);
    }

    #[test]
    fn test_single_dominant_home() {
        let points = home_scenario();
        assert_eq!(points.len(), 500);

        let result = analyzer().analyze(&points).unwrap();

        let homes: Vec<_> = result
            .clusters
            .iter()
            .filter(|c| c.label == LocationLabel::Home)
            .collect();
        assert_eq!(homes.len(), 1);
        let home = homes[0];
        assert!(home.confidence > 0.5);
        assert_eq!(home.visit_count, 400);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.summary.transit_points, 100);

        assert!(result.metrics.exposure > 0.5);
        assert_eq!(result.recommendations[0].priority, PRIORITY_HOME);
        assert_eq!(
            result.recommendations[0].triggered_by,
            RecommendationTrigger::Cluster {
                cluster_id: home.id
            }
        );

        let sensitive = result.sensitive_locations();
        assert_eq!(sensitive.len(), 1);
        assert_eq!(sensitive[0].label, LocationLabel::Home);

        assert_partition(&result);
        assert_bounds(&result);
    }

    #[test]
    fn test_no_recurring_stays() {
        let result = analyzer().analyze(&scattered(200)).unwrap();

        assert!(result
            .clusters
            .iter()
            .all(|c| matches!(c.label, LocationLabel::Rare | LocationLabel::Unknown)));
        assert_eq!(result.metrics.exposure, 0.0);

        let expected = score::aggregate(
            &MetricValues {
                consistency: result.metrics.consistency,
                uniqueness: result.metrics.uniqueness,
                exposure: 0.0,
            },
            &MetricWeights::default(),
        );
        assert_eq!(result.metrics.overall_score, expected);
        assert_partition(&result);
        assert_bounds(&result);
    }

    #[test]
    fn test_malformed_point_dropped() {
        let mut points = scattered(15);
        points.insert(
            7,
            RawPoint::new(200.0, 13.0, day_start(0) + Duration::minutes(5)),
        );

        let result = analyzer().analyze(&points).unwrap();
        assert_eq!(result.summary.input_points, 16);
        assert_eq!(result.summary.valid_points, 15);
        assert_eq!(result.summary.dropped_points, 1);
        assert_eq!(result.summary.retained_points, 15);
    }

    #[test]
    fn test_minimum_data_gate() {
        let config = AnalysisConfig::default();
        let required = config.min_points_required;

        let too_few = analyze_trace(&scattered(required - 1), &config);
        assert!(matches!(
            too_few,
            Err(AnalysisError::InsufficientData { valid, required: r, dropped: 0 })
                if valid == required - 1 && r == required
        ));

        assert!(analyze_trace(&scattered(required), &config).is_ok());
    }

    #[test]
    fn test_idempotent() {
        let points = home_scenario();
        let analyzer = analyzer();
        let first = analyzer.analyze(&points).unwrap();
        let second = analyzer.analyze(&points).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let points = home_scenario();
        let mut reversed = points.clone();
        reversed.reverse();

        let analyzer = analyzer();
        assert_eq!(
            analyzer.analyze(&points).unwrap(),
            analyzer.analyze(&reversed).unwrap()
        );
    }

    #[test]
    fn test_downsampled_trace_keeps_invariants() {
        let config = AnalysisConfig {
            downsample_ceiling: Some(200),
            ..AnalysisConfig::default()
        };
        let result = analyze_trace(&home_scenario(), &config).unwrap();
        assert_eq!(result.summary.downsample_stride, 2);
        assert_eq!(result.summary.retained_points, 250);
        assert_partition(&result);
        assert_bounds(&result);
    }

    #[test]
    fn test_invalid_config_rejected_before_analysis() {
        let config = AnalysisConfig {
            metric_weights: MetricWeights {
                consistency: 0.5,
                uniqueness: 0.5,
                exposure: 0.5,
            },
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            TraceAnalyzer::new(config.clone()),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
        // Config errors win even when the data would also fail
        assert!(matches!(
            analyze_trace::<RawPoint>(&[], &config),
            Err(AnalysisError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_analyze_points_json() {
        let json = serde_json::to_string(
            &scattered(12)
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "lat": p.lat,
                        "lon": p.lon,
                        "timestamp": p.timestamp.map(|t| t.to_rfc3339()),
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap();

        let result = analyze_points_json(&json, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.summary.valid_points, 12);
        assert!(result.clusters.is_empty());
    }

    #[test]
    fn test_analyze_strava_json() {
        // One hour parked at the same spot, sampled every 30 s
        let latlng: Vec<[f64; 2]> = (0..120).map(|_| [HOME.lat, HOME.lon]).collect();
        let time: Vec<i64> = (0..120).map(|i| i * 30).collect();
        let json = serde_json::json!({
            "start_date": "2024-01-15T23:00:00Z",
            "streams": {"latlng": latlng, "time": time},
        })
        .to_string();

        let result = analyze_strava_json(&json, &AnalysisConfig::default()).unwrap();
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].visit_count, 120);
        assert_eq!(result.summary.median_interval_secs, Some(30.0));
        assert!(result
            .recommendations
            .iter()
            .any(|r| matches!(r.triggered_by, RecommendationTrigger::SamplingRate { .. })));
    }

    #[test]
    fn test_analyze_json_propagates_adapter_errors() {
        let result = analyzer().analyze_json("{}", TraceFormat::Strava);
        assert!(matches!(result, Err(AnalysisError::MissingField(_))));
    }

    #[test]
    fn test_analyzer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TraceAnalyzer>();
    }
}
