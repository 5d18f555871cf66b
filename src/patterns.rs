//! Visit pattern extraction
//!
//! Fills the per-cluster visit statistics from member points:
//! - Hour-of-day and day-of-week histograms (local time)
//! - Distinct calendar days, first/last visit
//! - Spatial radius around the centroid

use chrono::{Datelike, FixedOffset, NaiveDate, Timelike};
use std::collections::BTreeSet;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::geo::haversine_m;
use crate::types::{Cluster, PointSequence};

/// Pattern extractor for stay clusters
pub struct PatternExtractor {
    offset: FixedOffset,
}

impl PatternExtractor {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            offset: config.local_offset()?,
        })
    }

    /// Compute visit statistics for every cluster
    pub fn extract(&self, clusters: Vec<Cluster>, sequence: &PointSequence) -> Vec<Cluster> {
        clusters
            .into_iter()
            .map(|cluster| self.extract_one(cluster, sequence))
            .collect()
    }

    fn extract_one(&self, mut cluster: Cluster, sequence: &PointSequence) -> Cluster {
        let mut time_histogram = [0u32; 24];
        let mut weekday_histogram = [0u32; 7];
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut radius_m: f64 = 0.0;

        for &index in &cluster.member_indices {
            let point = &sequence[index];
            let local = point.timestamp().with_timezone(&self.offset);

            time_histogram[local.hour() as usize] += 1;
            weekday_histogram[local.weekday().num_days_from_monday() as usize] += 1;
            days.insert(local.date_naive());
            radius_m = radius_m.max(haversine_m(cluster.centroid, point.coordinate()));
        }

        // Members are indices into a time-ordered sequence
        cluster.first_seen = cluster
            .member_indices
            .first()
            .map(|&i| sequence[i].timestamp());
        cluster.last_seen = cluster
            .member_indices
            .last()
            .map(|&i| sequence[i].timestamp());
        cluster.time_histogram = time_histogram;
        cluster.weekday_histogram = weekday_histogram;
        cluster.distinct_days = days.len() as u32;
        cluster.radius_m = radius_m;
        cluster
    }

    /// Distinct local calendar days covered by the whole trace
    pub fn total_days(&self, sequence: &PointSequence) -> u32 {
        sequence
            .iter()
            .map(|p| p.timestamp().with_timezone(&self.offset).date_naive())
            .collect::<BTreeSet<_>>()
            .len() as u32
    }

    /// Local weekday (0 = Monday) of a point
    pub fn weekday_of(&self, sequence: &PointSequence, index: usize) -> usize {
        sequence[index]
            .timestamp()
            .with_timezone(&self.offset)
            .weekday()
            .num_days_from_monday() as usize
    }
}
