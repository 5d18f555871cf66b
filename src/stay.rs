//! Stay detection
//!
//! Partitions a normalized trace into recurring stay clusters.
//!
//! Two passes over the time-ordered sequence:
//! 1. Dwell segmentation: a run of consecutive points that stays within the
//!    distance threshold of its first point for at least the minimum dwell
//!    time is a stay; every other point is transit.
//! 2. Assignment: each dwell point joins the nearest cluster whose centroid is
//!    within the threshold (exact ties go to the lower id) or opens a new one.
//!    Centroids are running means updated as members arrive.

use chrono::Duration;
use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::geo::haversine_m;
use crate::types::{Cluster, Coordinate, PointSequence};

/// Output of stay detection
#[derive(Debug, Clone, PartialEq)]
pub struct StayDetection {
    /// Clusters in first-visit order, unlabeled
    pub clusters: Vec<Cluster>,
    /// Points that never accumulated enough dwell time
    pub transit_indices: Vec<usize>,
}

/// Stay detector configured from the analysis config
pub struct StayDetector {
    distance_threshold_m: f64,
    min_dwell: Duration,
}

impl StayDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            distance_threshold_m: config.cluster_distance_threshold_m,
            min_dwell: Duration::milliseconds((config.cluster_min_dwell_minutes * 60_000.0) as i64),
        }
    }

    /// Detect stay clusters in a normalized sequence
    pub fn detect(&self, sequence: &PointSequence) -> StayDetection {
        let dwell = self.dwell_mask(sequence);

        let mut clusters: Vec<Cluster> = Vec::new();
        let mut transit_indices = Vec::new();

        for (index, point) in sequence.iter().enumerate() {
            if !dwell[index] {
                transit_indices.push(index);
                continue;
            }

            let coord = point.coordinate();
            match self.nearest_cluster(&clusters, coord) {
                Some(position) => add_member(&mut clusters[position], index, coord),
                None => {
                    let mut cluster = Cluster::new(clusters.len(), coord);
                    add_member(&mut cluster, index, coord);
                    clusters.push(cluster);
                }
            }
        }

        info!(
            "Detected {} stay clusters ({} transit points)",
            clusters.len(),
            transit_indices.len()
        );

        StayDetection {
            clusters,
            transit_indices,
        }
    }

    /// Mark points that belong to a dwell segment
    fn dwell_mask(&self, sequence: &PointSequence) -> Vec<bool> {
        let points = sequence.as_slice();
        let n = points.len();
        let mut mask = vec![false; n];

        let mut i = 0;
        while i < n {
            let anchor = points[i].coordinate();
            let mut last = i;
            while last + 1 < n
                && haversine_m(anchor, points[last + 1].coordinate()) <= self.distance_threshold_m
            {
                last += 1;
            }

            if points[last].timestamp() - points[i].timestamp() >= self.min_dwell {
                debug!("Dwell segment {}..={} ({} points)", i, last, last - i + 1);
                for flag in &mut mask[i..=last] {
                    *flag = true;
                }
                i = last + 1;
            } else if last + 1 == n {
                // Later anchors end no further than `last` and start later
                break;
            } else {
                // An anchor inside a failed run only outlasts it by reaching
                // the point that ended it
                let stop = points[last + 1].coordinate();
                i += 1;
                while i <= last
                    && haversine_m(points[i].coordinate(), stop) > self.distance_threshold_m
                {
                    i += 1;
                }
            }
        }

        mask
    }

    /// Position of the nearest cluster within threshold; ties go to the lower id
    fn nearest_cluster(&self, clusters: &[Cluster], coord: Coordinate) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (position, cluster) in clusters.iter().enumerate() {
            let distance = haversine_m(cluster.centroid, coord);
            if distance > self.distance_threshold_m {
                continue;
            }
            // Strict comparison keeps the earlier (lower id) cluster on ties
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((position, distance)),
            }
        }
        best.map(|(position, _)| position)
    }
}

/// Add a member and update the running-mean centroid
fn add_member(cluster: &mut Cluster, index: usize, coord: Coordinate) {
    cluster.member_indices.insert(index);
    cluster.visit_count += 1;
    let n = cluster.visit_count as f64;
    cluster.centroid.lat += (coord.lat - cluster.centroid.lat) / n;
    cluster.centroid.lon += (coord.lon - cluster.centroid.lon) / n;
}
