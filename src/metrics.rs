//! Risk metric computation
//!
//! Derives the three privacy sub-metrics from labeled clusters:
//! - Consistency: how regularly the same places recur across days
//! - Uniqueness: how concentrated visits are in few, sharply timed places
//! - Exposure: share of clustered visits at home or work
//!
//! Every metric is clamped to 0-1; undefined cases are 0.

use serde::{Deserialize, Serialize};

use crate::types::{Cluster, LocationLabel};

/// Number of hour-of-day bins
const HOURS_PER_DAY: f64 = 24.0;

/// Sub-metrics before score aggregation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricValues {
    pub consistency: f64,
    pub uniqueness: f64,
    pub exposure: f64,
}

/// Risk metric engine
pub struct RiskMetricEngine {
    frequent_threshold: u32,
}

impl RiskMetricEngine {
    pub fn new(frequent_threshold: u32) -> Self {
        Self { frequent_threshold }
    }

    /// Compute all three metrics
    pub fn compute(&self, clusters: &[Cluster], total_days_observed: u32) -> MetricValues {
        MetricValues {
            consistency: compute_consistency(clusters, total_days_observed),
            uniqueness: compute_uniqueness(clusters, self.frequent_threshold),
            exposure: compute_exposure(clusters),
        }
    }
}

/// Mean of `distinct_days / total_days` over recurring (non-rare) clusters
fn compute_consistency(clusters: &[Cluster], total_days_observed: u32) -> f64 {
    if total_days_observed == 0 {
        return 0.0;
    }

    let ratios: Vec<f64> = clusters
        .iter()
        .filter(|c| !matches!(c.label, LocationLabel::Rare | LocationLabel::Unknown))
        .map(|c| c.distinct_days as f64 / total_days_observed as f64)
        .collect();

    if ratios.is_empty() {
        return 0.0;
    }
    (ratios.iter().sum::<f64>() / ratios.len() as f64).clamp(0.0, 1.0)
}

/// Blend of spatial and temporal concentration
///
/// ```text
/// spatial  = 1 / exp(H)                 H = entropy of visits across clusters
/// temporal = Σ p_k · (1 - H_k / ln 24) · min(1, n_k / frequent_threshold)
/// uniqueness = 0.5 · spatial + 0.5 · temporal
/// ```
///
/// `exp(H)` is the effective number of places, so one dominant place gives a
/// spatial term near 1 and many equally visited places push it towards 0.
fn compute_uniqueness(clusters: &[Cluster], frequent_threshold: u32) -> f64 {
    let total: u32 = clusters.iter().map(|c| c.visit_count).sum();
    if total == 0 {
        return 0.0;
    }

    let shares: Vec<f64> = clusters
        .iter()
        .map(|c| c.visit_count as f64 / total as f64)
        .collect();

    let spatial = 1.0 / entropy(&shares).exp();

    let temporal: f64 = clusters
        .iter()
        .zip(&shares)
        .map(|(c, share)| {
            let reliability = if frequent_threshold == 0 {
                1.0
            } else {
                (c.visit_count as f64 / frequent_threshold as f64).min(1.0)
            };
            share * hour_concentration(c) * reliability
        })
        .sum();

    (0.5 * spatial + 0.5 * temporal).clamp(0.0, 1.0)
}

/// Share of clustered visits inside HOME or WORK clusters
fn compute_exposure(clusters: &[Cluster]) -> f64 {
    let total: u32 = clusters.iter().map(|c| c.visit_count).sum();
    if total == 0 {
        return 0.0;
    }
    let sensitive: u32 = clusters
        .iter()
        .filter(|c| c.label.is_sensitive())
        .map(|c| c.visit_count)
        .sum();
    (sensitive as f64 / total as f64).clamp(0.0, 1.0)
}

/// `1 - H / ln 24` over the hour histogram: 1 when all visits share one hour
fn hour_concentration(cluster: &Cluster) -> f64 {
    let total: u32 = cluster.time_histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let shares: Vec<f64> = cluster
        .time_histogram
        .iter()
        .map(|&count| count as f64 / total as f64)
        .collect();
    (1.0 - entropy(&shares) / HOURS_PER_DAY.ln()).clamp(0.0, 1.0)
}

/// Shannon entropy (natural log) of a distribution; zero shares are skipped
fn entropy(shares: &[f64]) -> f64 {
    shares
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}
