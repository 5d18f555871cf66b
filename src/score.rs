//! Score aggregation
//!
//! ```text
//! overall_score = round(100 * (w_c * consistency + w_u * uniqueness + w_e * exposure))
//! ```
//!
//! clamped to 0-100. Pure: identical metrics and weights give identical scores.

use crate::config::MetricWeights;
use crate::metrics::MetricValues;
use crate::types::RiskMetrics;

/// Combine sub-metrics into a 0-100 score
pub fn aggregate(values: &MetricValues, weights: &MetricWeights) -> u8 {
    let weighted = weights.consistency * values.consistency.clamp(0.0, 1.0)
        + weights.uniqueness * values.uniqueness.clamp(0.0, 1.0)
        + weights.exposure * values.exposure.clamp(0.0, 1.0);
    (100.0 * weighted).round().clamp(0.0, 100.0) as u8
}

/// Build the final metrics record
pub fn risk_metrics(values: &MetricValues, weights: &MetricWeights) -> RiskMetrics {
    RiskMetrics {
        consistency: values.consistency.clamp(0.0, 1.0),
        uniqueness: values.uniqueness.clamp(0.0, 1.0),
        exposure: values.exposure.clamp(0.0, 1.0),
        overall_score: aggregate(values, weights),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(consistency: f64, uniqueness: f64, exposure: f64) -> MetricValues {
        MetricValues {
            consistency,
            uniqueness,
            exposure,
        }
    }

    #[test]
    fn test_default_weights() {
        let weights = MetricWeights::default();
        assert_eq!(aggregate(&values(1.0, 1.0, 1.0), &weights), 100);
        assert_eq!(aggregate(&values(0.0, 0.0, 0.0), &weights), 0);
        assert_eq!(aggregate(&values(0.0, 0.0, 1.0), &weights), 40);
        assert_eq!(aggregate(&values(0.5, 0.5, 0.5), &weights), 50);
    }

    #[test]
    fn test_rounding() {
        let weights = MetricWeights::default();
        // 100 * (0.3 * 0.5 + 0.3 * 0.1 + 0.4 * 0.0) = 18
        assert_eq!(aggregate(&values(0.5, 0.1, 0.0), &weights), 18);
        // 100 * 0.4 * 0.33 = 13.2
        assert_eq!(aggregate(&values(0.0, 0.0, 0.33), &weights), 13);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let weights = MetricWeights::default();
        assert_eq!(aggregate(&values(2.0, 2.0, 2.0), &weights), 100);
        assert_eq!(aggregate(&values(-1.0, -1.0, -1.0), &weights), 0);
    }

    #[test]
    fn test_deterministic() {
        let weights = MetricWeights::default();
        let v = values(0.37, 0.81, 0.64);
        assert_eq!(aggregate(&v, &weights), aggregate(&v, &weights));
        assert_eq!(risk_metrics(&v, &weights), risk_metrics(&v, &weights));
    }

    #[test]
    fn test_exposure_weight_monotonicity() {
        // exposure dominates the other two metrics
        let v = values(0.4, 0.2, 0.9);
        let mut previous = 0u8;
        for step in 0..=20 {
            let w_e = step as f64 / 20.0;
            // Other weights shrink proportionally from the default 0.3/0.3 split
            let rest = 1.0 - w_e;
            let weights = MetricWeights {
                consistency: rest * 0.5,
                uniqueness: rest * 0.5,
                exposure: w_e,
            };
            let score = aggregate(&v, &weights);
            assert!(score >= previous, "score dropped at w_e = {w_e}");
            previous = score;
        }
        assert_eq!(previous, 90);
    }
}
