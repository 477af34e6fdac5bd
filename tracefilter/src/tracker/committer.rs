//! Sink persisting committed samples.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::activity::ActivitySelector;
use crate::filter::SampleSink;
use crate::sample::LocationSample;
use crate::store::{SessionStore, StorageError};
use crate::track::TrackAggregator;

#[derive(Debug, Default)]
struct SessionProgress {
    aggregator: TrackAggregator,
    is_valid: bool,
}

/// Writes committed samples to the store and keeps per-session statistics.
///
/// For each committed sample:
/// 1. tag it with the current activity if it carries none,
/// 2. append it to the store,
/// 3. on success, update the session's aggregator and the stored progress.
///
/// A failed append leaves the aggregator untouched.
pub struct TrackCommitter {
    store: Arc<dyn SessionStore>,
    sessions: DashMap<String, SessionProgress>,
    activity: Arc<ActivitySelector>,
}

impl TrackCommitter {
    pub fn new(store: Arc<dyn SessionStore>, activity: Arc<ActivitySelector>) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            activity,
        }
    }

    /// Start tracking statistics for a session, resetting any previous state.
    pub fn register(&self, session_id: &str, is_valid: bool) {
        self.sessions.insert(
            session_id.to_string(),
            SessionProgress {
                aggregator: TrackAggregator::new(),
                is_valid,
            },
        );
    }

    /// Stop tracking a session and hand back its final statistics.
    pub fn unregister(&self, session_id: &str) -> Option<TrackAggregator> {
        self.sessions
            .remove(session_id)
            .map(|(_, progress)| progress.aggregator)
    }

    /// Snapshot of a session's statistics.
    pub fn aggregator(&self, session_id: &str) -> Option<TrackAggregator> {
        self.sessions
            .get(session_id)
            .map(|progress| progress.aggregator.clone())
    }

    pub fn activity(&self) -> &Arc<ActivitySelector> {
        &self.activity
    }
}

impl SampleSink for TrackCommitter {
    fn on_accepted(&self, session_id: &str, sample: &LocationSample) -> Result<(), StorageError> {
        let is_valid = self
            .sessions
            .get(session_id)
            .map(|progress| progress.is_valid)
            .unwrap_or(false);

        let tagged;
        let sample = match self.activity.current() {
            Some(activity) if sample.activity.is_unknown() => {
                tagged = sample.clone().with_activity(activity.into());
                &tagged
            }
            _ => sample,
        };

        self.store.append_sample(session_id, is_valid, sample)?;

        let (distance_m, elapsed_time_ms) = {
            let mut progress = self.sessions.entry(session_id.to_string()).or_default();
            progress.aggregator.update(sample);
            (
                progress.aggregator.distance_m(),
                progress.aggregator.elapsed_time_ms(),
            )
        };

        trace!(
            session = %session_id,
            distance_m,
            elapsed_time_ms,
            "Sample committed"
        );

        self.store
            .update_progress(session_id, distance_m, elapsed_time_ms)?;
        Ok(())
    }
}

impl std::fmt::Debug for TrackCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackCommitter")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
