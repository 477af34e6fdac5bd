//! Tracks and trip statistics.
//!
//! A [`Track`] is the persisted trajectory of one tracking session: the
//! committed samples in temporal order plus the progress counters the
//! committer keeps up to date. [`TrackAggregator`] computes those counters
//! incrementally while a session is live.

mod aggregator;
mod stats;

pub use aggregator::TrackAggregator;
pub use stats::SpeedStats;

use chrono::{DateTime, Utc};

use crate::geo::{distance, DistanceStrategy};
use crate::sample::LocationSample;

/// One tracking session's trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub session_id: String,
    /// Committed samples, insertion order = temporal order.
    pub samples: Vec<LocationSample>,
    /// Travelled distance in meters as last recorded.
    pub distance_m: f64,
    /// Whether the session is registered remotely.
    pub is_valid: bool,
    /// Whether the session has been stopped.
    pub is_closed: bool,
}

impl Track {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            samples: Vec::new(),
            distance_m: 0.0,
            is_valid: false,
            is_closed: false,
        }
    }

    /// Build a track from samples, computing its distance.
    pub fn from_samples(session_id: impl Into<String>, samples: Vec<LocationSample>) -> Self {
        let mut track = Self::new(session_id);
        track.samples = samples;
        track.distance_m = track.path_length(DistanceStrategy::default());
        track
    }

    /// Geodesic length of the sample path.
    pub fn path_length(&self, strategy: DistanceStrategy) -> f64 {
        self.samples
            .windows(2)
            .map(|pair| distance(strategy, &pair[0], &pair[1]))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start_timestamp(&self) -> Option<i64> {
        self.samples.first().map(|s| s.timestamp_ms)
    }

    pub fn end_timestamp(&self) -> Option<i64> {
        self.samples.last().map(|s| s.timestamp_ms)
    }

    /// Wall-clock duration from the first to the last sample; 0 when empty.
    pub fn elapsed_time_ms(&self) -> i64 {
        match (self.start_timestamp(), self.end_timestamp()) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_timestamp().and_then(DateTime::from_timestamp_millis)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_timestamp().and_then(DateTime::from_timestamp_millis)
    }

    pub fn speed_stats(&self) -> Option<SpeedStats> {
        SpeedStats::from_speeds(self.samples.iter().map(|s| f64::from(s.speed)))
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            session_id: self.session_id.clone(),
            is_closed: self.is_closed,
            is_valid: self.is_valid,
            distance_m: self.distance_m,
            elapsed_time_ms: self.elapsed_time_ms(),
        }
    }
}

/// Track metadata without samples, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub session_id: String,
    pub is_closed: bool,
    pub is_valid: bool,
    pub distance_m: f64,
    pub elapsed_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_track() {
        let track = Track::new("1");
        assert!(track.is_empty());
        assert_eq!(track.start_timestamp(), None);
        assert_eq!(track.elapsed_time_ms(), 0);
        assert!(track.speed_stats().is_none());
        assert!(track.start_time().is_none());
    }

    #[test]
    fn test_derived_values() {
        let samples = vec![
            LocationSample::new(45.0, 7.0)
                .at_millis(1_700_000_000_000)
                .with_speed(2.0),
            LocationSample::new(45.001, 7.0)
                .at_millis(1_700_000_060_000)
                .with_speed(4.0),
        ];
        let track = Track::from_samples("3", samples);

        assert_eq!(track.len(), 2);
        assert_eq!(track.elapsed_time_ms(), 60_000);
        assert!((track.distance_m - 111.19).abs() < 0.5);
        assert_eq!(
            track.start_time().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );

        let stats = track.speed_stats().unwrap();
        assert!((stats.mean_kmh - 10.8).abs() < 1e-6);

        let summary = track.summary();
        assert_eq!(summary.session_id, "3");
        assert_eq!(summary.elapsed_time_ms, 60_000);
        assert!(!summary.is_closed);
    }
}
