//! Location labeling
//!
//! Heuristic classification of stay clusters as home, work, frequent or rare.
//! Rules are data: an ordered list of tagged variants evaluated in fixed
//! precedence, first match wins. Boundaries are inclusive.

use log::debug;

use crate::config::{AnalysisConfig, LabelingThresholds};
use crate::types::{Cluster, LocationLabel};

/// Local hours counted as night (22:00-06:00)
pub const NIGHT_HOURS: [usize; 8] = [22, 23, 0, 1, 2, 3, 4, 5];

/// Local hours counted as working daytime (09:00-17:00)
pub const DAYTIME_HOURS: [usize; 8] = [9, 10, 11, 12, 13, 14, 15, 16];

/// Monday to Friday
pub const WEEKDAYS: [usize; 5] = [0, 1, 2, 3, 4];

/// Saturday and Sunday
pub const WEEKEND_DAYS: [usize; 2] = [5, 6];

/// A labeling rule with its thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelRule {
    Home {
        min_days: u32,
        min_night_fraction: f64,
    },
    Work {
        min_days: u32,
        min_weekday_fraction: f64,
        min_daytime_fraction: f64,
    },
    Frequent {
        min_visits: u32,
    },
}

/// Result of a rule matching a cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch {
    pub label: LocationLabel,
    pub confidence: f64,
    /// Fraction used to pick a single winner for unique labels
    pub strength: f64,
}

impl LabelRule {
    pub fn label(&self) -> LocationLabel {
        match self {
            LabelRule::Home { .. } => LocationLabel::Home,
            LabelRule::Work { .. } => LocationLabel::Work,
            LabelRule::Frequent { .. } => LocationLabel::Frequent,
        }
    }

    /// Evaluate the rule against one cluster's visit pattern
    pub fn evaluate(&self, cluster: &Cluster) -> Option<RuleMatch> {
        match *self {
            LabelRule::Home {
                min_days,
                min_night_fraction,
            } => {
                let night = cluster.hour_fraction(&NIGHT_HOURS);
                if cluster.distinct_days >= min_days && night >= min_night_fraction {
                    Some(RuleMatch {
                        label: LocationLabel::Home,
                        confidence: margin(night, min_night_fraction),
                        strength: night,
                    })
                } else {
                    None
                }
            }
            LabelRule::Work {
                min_days,
                min_weekday_fraction,
                min_daytime_fraction,
            } => {
                let weekday = cluster.weekday_fraction(&WEEKDAYS);
                let daytime = cluster.hour_fraction(&DAYTIME_HOURS);
                if cluster.distinct_days >= min_days
                    && weekday >= min_weekday_fraction
                    && daytime >= min_daytime_fraction
                {
                    Some(RuleMatch {
                        label: LocationLabel::Work,
                        confidence: margin(weekday, min_weekday_fraction)
                            .min(margin(daytime, min_daytime_fraction)),
                        strength: daytime,
                    })
                } else {
                    None
                }
            }
            LabelRule::Frequent { min_visits } => {
                if cluster.visit_count >= min_visits {
                    Some(RuleMatch {
                        label: LocationLabel::Frequent,
                        confidence: frequent_confidence(cluster.visit_count, min_visits),
                        strength: cluster.visit_count as f64,
                    })
                } else {
                    None
                }
            }
        }
    }
}

/// Heuristic labeler over an ordered rule list
pub struct LocationLabeler {
    rules: Vec<LabelRule>,
    frequent_threshold: u32,
}

impl LocationLabeler {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            rules: default_rules(&config.labeling, config.frequent_visit_threshold),
            frequent_threshold: config.frequent_visit_threshold,
        }
    }

    /// Build a labeler from an explicit rule list
    pub fn with_rules(rules: Vec<LabelRule>, frequent_threshold: u32) -> Self {
        Self {
            rules,
            frequent_threshold,
        }
    }

    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    /// Label a single cluster in isolation (no HOME/WORK uniqueness)
    pub fn classify(&self, cluster: &Cluster) -> RuleMatch {
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(cluster))
            .unwrap_or_else(|| RuleMatch {
                label: LocationLabel::Rare,
                confidence: rare_confidence(cluster.visit_count, self.frequent_threshold),
                strength: 0.0,
            })
    }

    /// Label all clusters; at most one HOME and one WORK survive
    pub fn label(&self, mut clusters: Vec<Cluster>) -> Vec<Cluster> {
        let matches: Vec<RuleMatch> = clusters.iter().map(|c| self.classify(c)).collect();

        let home_winner = unique_winner(&matches, LocationLabel::Home);
        let work_winner = unique_winner(&matches, LocationLabel::Work);

        for (position, (cluster, rule_match)) in clusters.iter_mut().zip(matches).enumerate() {
            let demoted = match rule_match.label {
                LocationLabel::Home => home_winner != Some(position),
                LocationLabel::Work => work_winner != Some(position),
                _ => false,
            };

            if demoted {
                debug!(
                    "Cluster {} qualified as {} but lost to a stronger match",
                    cluster.id,
                    rule_match.label.as_str()
                );
                cluster.label = LocationLabel::Frequent;
                cluster.confidence = frequent_confidence(cluster.visit_count, self.frequent_threshold);
            } else {
                cluster.label = rule_match.label;
                cluster.confidence = rule_match.confidence;
            }
        }

        clusters
    }
}

/// Rule list in precedence order: home, work, frequent
pub fn default_rules(thresholds: &LabelingThresholds, frequent_threshold: u32) -> Vec<LabelRule> {
    vec![
        LabelRule::Home {
            min_days: thresholds.home_min_days,
            min_night_fraction: thresholds.home_night_fraction,
        },
        LabelRule::Work {
            min_days: thresholds.work_min_days,
            min_weekday_fraction: thresholds.work_weekday_fraction,
            min_daytime_fraction: thresholds.work_daytime_fraction,
        },
        LabelRule::Frequent {
            min_visits: frequent_threshold,
        },
    ]
}

/// Position of the strongest match for `label`; ties go to the earlier cluster
fn unique_winner(matches: &[RuleMatch], label: LocationLabel) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (position, m) in matches.iter().enumerate() {
        if m.label != label {
            continue;
        }
        match best {
            Some((_, strength)) if m.strength <= strength => {}
            _ => best = Some((position, m.strength)),
        }
    }
    best.map(|(position, _)| position)
}

/// How far `value` cleared `threshold`, scaled to the headroom above it
fn margin(value: f64, threshold: f64) -> f64 {
    if threshold >= 1.0 {
        return if value >= 1.0 { 1.0 } else { 0.0 };
    }
    ((value - threshold) / (1.0 - threshold)).clamp(0.0, 1.0)
}

/// `1 - threshold / visits`: 0 at the threshold, approaching 1 with more visits
fn frequent_confidence(visits: u32, threshold: u32) -> f64 {
    if visits == 0 {
        return 0.0;
    }
    (1.0 - threshold as f64 / visits as f64).clamp(0.0, 1.0)
}

/// Distance below the frequent threshold, relative to it
fn rare_confidence(visits: u32, threshold: u32) -> f64 {
    if threshold == 0 {
        return 0.0;
    }
    ((threshold as f64 - visits as f64) / threshold as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    /// Cluster with `per_hour` visits in each listed hour, spread over `days`
    fn cluster(id: usize, hours: &[usize], per_hour: u32, weekdays: &[usize], days: u32) -> Cluster {
        let mut c = Cluster::new(id, Coordinate { lat: 0.0, lon: 0.0 });
        for &h in hours {
            c.time_histogram[h] += per_hour;
        }
        c.visit_count = c.time_histogram.iter().sum();
        // Spread visits over the given weekdays, remainder on the first one
        let share = c.visit_count / weekdays.len() as u32;
        for &d in weekdays {
            c.weekday_histogram[d] = share;
        }
        c.weekday_histogram[weekdays[0]] += c.visit_count - share * weekdays.len() as u32;
        c.distinct_days = days;
        c.member_indices = (0..c.visit_count as usize).map(|i| i + id * 1000).collect();
        c
    }

    fn labeler() -> LocationLabeler {
        LocationLabeler::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_home_rule() {
        let c = cluster(0, &[22, 23, 0, 1], 5, &[0, 1, 2, 3, 4, 5, 6], 7);
        let m = labeler().classify(&c);
        assert_eq!(m.label, LocationLabel::Home);
        assert!((m.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_home_boundary_is_inclusive() {
        // Exactly half the visits at night, exactly 3 days
        let c = cluster(0, &[23, 12], 4, &[0, 1, 2, 3, 4, 5, 6], 3);
        let m = labeler().classify(&c);
        assert_eq!(m.label, LocationLabel::Home);
        assert_eq!(m.confidence, 0.0);
    }

    #[test]
    fn test_home_needs_three_days() {
        let c = cluster(0, &[22, 23, 0, 1], 5, &[0, 1], 2);
        assert_eq!(labeler().classify(&c).label, LocationLabel::Frequent);
    }

    #[test]
    fn test_work_rule() {
        let c = cluster(0, &[9, 10, 11, 14, 15], 4, &[0, 1, 2, 3, 4], 5);
        let m = labeler().classify(&c);
        assert_eq!(m.label, LocationLabel::Work);
        assert!((m.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_work_needs_weekdays() {
        let c = cluster(0, &[9, 10, 11, 14, 15], 4, &[0, 5, 6], 5);
        assert_eq!(labeler().classify(&c).label, LocationLabel::Frequent);
    }

    #[test]
    fn test_frequent_and_rare() {
        let frequent = cluster(0, &[18], 5, &[5], 1);
        let m = labeler().classify(&frequent);
        assert_eq!(m.label, LocationLabel::Frequent);
        assert_eq!(m.confidence, 0.0);

        let rare = cluster(1, &[18], 1, &[5], 1);
        let m = labeler().classify(&rare);
        assert_eq!(m.label, LocationLabel::Rare);
        assert!((m.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_only_one_home() {
        let strong = cluster(0, &[22, 23, 0, 1], 5, &[0, 1, 2, 3, 4, 5, 6], 7);
        // 12 of 20 visits at night
        let mut weak = cluster(1, &[22, 23, 0], 4, &[0, 1, 2, 3, 4, 5, 6], 7);
        weak.time_histogram[18] += 8;
        weak.visit_count += 8;
        weak.weekday_histogram[0] += 8;

        let labeled = labeler().label(vec![weak, strong]);
        assert_eq!(labeled[0].label, LocationLabel::Frequent);
        assert_eq!(labeled[1].label, LocationLabel::Home);
        assert_eq!(
            labeled
                .iter()
                .filter(|c| c.label == LocationLabel::Home)
                .count(),
            1
        );
    }

    #[test]
    fn test_equal_strength_goes_to_earlier_cluster() {
        let a = cluster(0, &[9, 10, 11, 14, 15], 4, &[0, 1, 2, 3, 4], 5);
        let b = cluster(1, &[9, 10, 11, 14, 15], 4, &[0, 1, 2, 3, 4], 5);

        let labeled = labeler().label(vec![a, b]);
        assert_eq!(labeled[0].label, LocationLabel::Work);
        assert_eq!(labeled[1].label, LocationLabel::Frequent);
    }

    #[test]
    fn test_rule_order_is_data() {
        let rules = vec![LabelRule::Frequent { min_visits: 5 }];
        let labeler = LocationLabeler::with_rules(rules, 5);
        let c = cluster(0, &[22, 23, 0, 1], 5, &[0, 1, 2, 3, 4, 5, 6], 7);
        assert_eq!(labeler.classify(&c).label, LocationLabel::Frequent);
        assert_eq!(labeler.rules().len(), 1);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(margin(0.5, 0.5), 0.0);
        assert_eq!(margin(1.0, 0.5), 1.0);
        assert_eq!(margin(1.0, 1.0), 1.0);
        assert_eq!(frequent_confidence(10, 5), 0.5);
        assert_eq!(rare_confidence(0, 5), 1.0);
    }
}
