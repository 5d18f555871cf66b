//! Recommendation generation
//!
//! Rule-based redaction advice derived from labeled clusters and metrics.
//! Each rule fires at most once with a fixed priority; output is sorted by
//! priority (highest first) and keeps evaluation order among equals.

use log::debug;

use crate::config::RecommendationThresholds;
use crate::labeler::WEEKEND_DAYS;
use crate::types::{
    Cluster, LocationLabel, MetricKind, Recommendation, RecommendationTrigger, RiskMetrics,
};

pub const PRIORITY_HOME: u32 = 100;
pub const PRIORITY_WORK: u32 = 90;
pub const PRIORITY_RARE: u32 = 70;
pub const PRIORITY_WEEKEND: u32 = 60;
pub const PRIORITY_RESOLUTION: u32 = 40;
pub const PRIORITY_OVERALL: u32 = 20;

/// Everything the rules look at
pub struct RecommendationInput<'a> {
    pub clusters: &'a [Cluster],
    pub metrics: &'a RiskMetrics,
    /// Median gap between fixes in the normalized trace
    pub median_interval_secs: Option<f64>,
}

/// Recommendation generator
pub struct RecommendationGenerator {
    thresholds: RecommendationThresholds,
}

impl RecommendationGenerator {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every rule and return fired recommendations, highest priority first
    pub fn generate(&self, input: &RecommendationInput<'_>) -> Vec<Recommendation> {
        let rules: [fn(&Self, &RecommendationInput<'_>) -> Option<Recommendation>; 6] = [
            Self::home_rule,
            Self::work_rule,
            Self::rare_rule,
            Self::weekend_rule,
            Self::resolution_rule,
            Self::overall_rule,
        ];

        let mut recommendations: Vec<Recommendation> =
            rules.iter().filter_map(|rule| rule(self, input)).collect();

        // Stable: equal priorities keep rule order
        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!("Generated {} recommendations", recommendations.len());
        recommendations
    }

    fn home_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let home = input
            .clusters
            .iter()
            .find(|c| c.label == LocationLabel::Home)?;
        if home.confidence < self.thresholds.home_confidence {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "Your home is clearly identifiable near ({:.4}, {:.4}). Before sharing, \
                 trim all points within {:.0} m of it and the first and last {} minutes \
                 of every trip that starts or ends there.",
                home.centroid.lat,
                home.centroid.lon,
                self.trim_radius(home),
                self.thresholds.trim_minutes
            ),
            priority: PRIORITY_HOME,
            triggered_by: RecommendationTrigger::Cluster {
                cluster_id: home.id,
            },
        })
    }

    fn work_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let work = input
            .clusters
            .iter()
            .find(|c| c.label == LocationLabel::Work)?;
        if work.confidence < self.thresholds.work_confidence {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "Your workplace is identifiable near ({:.4}, {:.4}). Remove points within \
                 {:.0} m of it, or share weekday daytime segments only in aggregate.",
                work.centroid.lat,
                work.centroid.lon,
                self.trim_radius(work)
            ),
            priority: PRIORITY_WORK,
            triggered_by: RecommendationTrigger::Cluster {
                cluster_id: work.id,
            },
        })
    }

    fn rare_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let rare: Vec<usize> = input
            .clusters
            .iter()
            .filter(|c| c.label == LocationLabel::Rare)
            .map(|c| c.id)
            .collect();
        if rare.len() <= self.thresholds.rare_cluster_count {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "The trace contains {} rarely visited places. One-off stops are highly \
                 distinctive; generalize them to a coarser area or remove those points.",
                rare.len()
            ),
            priority: PRIORITY_RARE,
            triggered_by: RecommendationTrigger::Clusters { cluster_ids: rare },
        })
    }

    fn weekend_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let mut weekend = 0u32;
        let mut total = 0u32;
        let mut ids = Vec::new();
        for cluster in input
            .clusters
            .iter()
            .filter(|c| c.label != LocationLabel::Work)
        {
            let visits: u32 = WEEKEND_DAYS
                .iter()
                .map(|&d| cluster.weekday_histogram[d])
                .sum();
            if visits > 0 {
                ids.push(cluster.id);
            }
            weekend += visits;
            total += cluster.visit_count;
        }

        if total == 0 {
            return None;
        }
        let fraction = weekend as f64 / total as f64;
        if fraction < self.thresholds.weekend_fraction {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "{:.0}% of your visits to non-work places happen on weekends. Consider \
                 excluding weekend segments, which tend to reveal personal routines.",
                fraction * 100.0
            ),
            priority: PRIORITY_WEEKEND,
            triggered_by: RecommendationTrigger::Clusters { cluster_ids: ids },
        })
    }

    fn resolution_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let interval = input.median_interval_secs?;
        if interval >= self.thresholds.min_sampling_interval_secs {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "Points are typically recorded every {:.0} s (median interval). Reduce the temporal \
                 resolution to one point every {:.0} s or more before sharing.",
                interval, self.thresholds.min_sampling_interval_secs
            ),
            priority: PRIORITY_RESOLUTION,
            triggered_by: RecommendationTrigger::SamplingRate {
                median_interval_secs: interval,
            },
        })
    }

    fn overall_rule(&self, input: &RecommendationInput<'_>) -> Option<Recommendation> {
        let score = input.metrics.overall_score;
        if score < self.thresholds.high_risk_score {
            return None;
        }
        Some(Recommendation {
            text: format!(
                "Overall risk is {}/100. Prefer sharing summaries (distance, duration, \
                 area) over the raw trace.",
                score
            ),
            priority: PRIORITY_OVERALL,
            triggered_by: RecommendationTrigger::Metric {
                metric: MetricKind::OverallScore,
            },
        })
    }

    /// Trim radius covers the whole stay even when it is wider than the default
    fn trim_radius(&self, cluster: &Cluster) -> f64 {
        self.thresholds.trim_radius_m.max(cluster.radius_m * 2.0)
    }
}
