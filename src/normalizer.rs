//! Point normalization
//!
//! Validates raw point records, orders them by time and optionally
//! down-samples long traces.
//! - Malformed points are dropped, not reported as errors
//! - Too few surviving points aborts the run
//! - Down-sampling keeps every Nth point, deterministically

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{GpsPoint, PointRecord, PointSequence};

/// Counts collected while normalizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub input_points: usize,
    pub valid_points: usize,
    pub dropped_points: usize,
    pub retained_points: usize,
    /// 1 when no down-sampling happened
    pub downsample_stride: usize,
}

/// Validated, ordered trace plus the counts that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTrace {
    pub sequence: PointSequence,
    pub report: NormalizationReport,
}

/// Normalizer for turning raw records into a point sequence
pub struct PointNormalizer;

impl PointNormalizer {
    /// Normalize raw records into a time-ordered point sequence
    pub fn normalize<R: PointRecord>(
        records: &[R],
        config: &AnalysisConfig,
    ) -> Result<NormalizedTrace, AnalysisError> {
        let mut valid = Vec::with_capacity(records.len());
        let mut dropped = 0usize;

        for (index, record) in records.iter().enumerate() {
            match GpsPoint::from_record(record) {
                Ok(point) => valid.push(point),
                Err(reason) => {
                    debug!("Dropping malformed point at index {}: {}", index, reason);
                    dropped += 1;
                }
            }
        }

        let valid_points = valid.len();
        if valid_points < config.min_points_required {
            return Err(AnalysisError::InsufficientData {
                valid: valid_points,
                required: config.min_points_required,
                dropped,
            });
        }

        // Stable sort: equal timestamps keep their input order
        let sorted = PointSequence::from_points(valid);

        let stride = downsample_stride(valid_points, config.downsample_ceiling);
        let sequence = if stride > 1 {
            PointSequence::from_points(sorted.iter().step_by(stride).copied().collect())
        } else {
            sorted
        };

        let report = NormalizationReport {
            input_points: records.len(),
            valid_points,
            dropped_points: dropped,
            retained_points: sequence.len(),
            downsample_stride: stride,
        };

        info!(
            "Normalized trace: {} input, {} valid, {} dropped, {} retained (stride {})",
            report.input_points,
            report.valid_points,
            report.dropped_points,
            report.retained_points,
            report.downsample_stride
        );

        Ok(NormalizedTrace { sequence, report })
    }
}

/// Stride that keeps the retained count at or just above the ceiling.
///
/// With `N = floor(count / ceiling)` the kept count is `ceil(count / N)`,
/// which is never below `ceiling` because `count / N >= ceiling`.
fn downsample_stride(count: usize, ceiling: Option<usize>) -> usize {
    match ceiling {
        Some(ceiling) if ceiling > 0 && count > ceiling => (count / ceiling).max(1),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPoint;
    use chrono::{Duration, TimeZone, Utc};

    fn make_points(n: usize) -> Vec<RawPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                RawPoint::new(
                    40.0 + i as f64 * 0.001,
                    -73.0,
                    start + Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let mut points = make_points(12);
        points.reverse();

        let trace = PointNormalizer::normalize(&points, &AnalysisConfig::default()).unwrap();
        let times: Vec<_> = trace.sequence.iter().map(|p| p.timestamp()).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(trace.sequence.len(), 12);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let mut points = make_points(10);
        points.push(RawPoint::new(1.0, 1.0, t));
        points.push(RawPoint::new(2.0, 2.0, t));

        let trace = PointNormalizer::normalize(&points, &AnalysisConfig::default()).unwrap();
        // make_points(10)[0] shares the timestamp and came first
        assert_eq!(trace.sequence[0].lat(), 40.0);
        assert_eq!(trace.sequence[1].lat(), 1.0);
        assert_eq!(trace.sequence[2].lat(), 2.0);
    }

    #[test]
    fn test_malformed_points_dropped_silently() {
        let mut points = make_points(15);
        points.push(RawPoint::new(200.0, 10.0, Utc::now()));
        points.push(RawPoint {
            lat: Some(10.0),
            lon: Some(10.0),
            timestamp: None,
        });

        let trace = PointNormalizer::normalize(&points, &AnalysisConfig::default()).unwrap();
        assert_eq!(trace.sequence.len(), 15);
        assert_eq!(trace.report.dropped_points, 2);
        assert_eq!(trace.report.input_points, 17);
    }

    #[test]
    fn test_minimum_data_gate() {
        let config = AnalysisConfig::default();

        let too_few = make_points(config.min_points_required - 1);
        match PointNormalizer::normalize(&too_few, &config) {
            Err(AnalysisError::InsufficientData { valid, required, .. }) => {
                assert_eq!(valid, 9);
                assert_eq!(required, 10);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }

        let exactly = make_points(config.min_points_required);
        assert!(PointNormalizer::normalize(&exactly, &config).is_ok());
    }

    #[test]
    fn test_drops_count_against_minimum() {
        let mut points = make_points(9);
        points.push(RawPoint::new(95.0, 0.0, Utc::now()));

        let result = PointNormalizer::normalize(&points, &AnalysisConfig::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InsufficientData { valid: 9, dropped: 1, .. })
        ));
    }

    #[test]
    fn test_downsampling_stays_at_or_above_ceiling() {
        let config = AnalysisConfig {
            downsample_ceiling: Some(40),
            ..AnalysisConfig::default()
        };
        let points = make_points(130);

        let trace = PointNormalizer::normalize(&points, &config).unwrap();
        // stride = 130 / 40 = 3, kept = ceil(130 / 3) = 44
        assert_eq!(trace.report.downsample_stride, 3);
        assert_eq!(trace.sequence.len(), 44);
        assert!(trace.sequence.len() >= 40);

        let again = PointNormalizer::normalize(&points, &config).unwrap();
        assert_eq!(trace.sequence, again.sequence);
    }

    #[test]
    fn test_no_downsampling_under_ceiling() {
        assert_eq!(downsample_stride(100, Some(100)), 1);
        assert_eq!(downsample_stride(100, None), 1);
        assert_eq!(downsample_stride(201, Some(100)), 2);
    }
}
