//! Incremental per-session trip statistics.

use crate::geo::{distance, DistanceStrategy};
use crate::sample::LocationSample;

use super::SpeedStats;

/// Accumulates distance and speed statistics over committed samples.
///
/// Fed by the committer in commit order. The distance only ever grows:
/// every committed sample adds the geodesic distance from the previous one.
#[derive(Debug, Clone, Default)]
pub struct TrackAggregator {
    strategy: DistanceStrategy,
    first_timestamp_ms: Option<i64>,
    last_emitted: Option<LocationSample>,
    distance_m: f64,
    sample_count: usize,
    speeds_mps: Vec<f64>,
}

impl TrackAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: DistanceStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Account for one committed sample. Returns the distance increment.
    pub fn update(&mut self, sample: &LocationSample) -> f64 {
        let increment = self
            .last_emitted
            .as_ref()
            .map_or(0.0, |last| distance(self.strategy, last, sample));

        self.distance_m += increment;
        self.sample_count += 1;
        self.speeds_mps.push(f64::from(sample.speed));
        self.first_timestamp_ms.get_or_insert(sample.timestamp_ms);
        self.last_emitted = Some(sample.clone());

        increment
    }

    /// Total distance in meters.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Wall-clock time from the first to the last committed sample.
    pub fn elapsed_time_ms(&self) -> i64 {
        match (self.first_timestamp_ms, &self.last_emitted) {
            (Some(first), Some(last)) => last.timestamp_ms - first,
            _ => 0,
        }
    }

    pub fn last_emitted(&self) -> Option<&LocationSample> {
        self.last_emitted.as_ref()
    }

    /// Speed statistics over the reported speeds of committed samples.
    pub fn speed_stats(&self) -> Option<SpeedStats> {
        SpeedStats::from_speeds(self.speeds_mps.iter().copied())
    }

    pub fn strategy(&self) -> DistanceStrategy {
        self.strategy
    }

    pub fn reset(&mut self) {
        *self = Self::with_strategy(self.strategy);
    }
}
