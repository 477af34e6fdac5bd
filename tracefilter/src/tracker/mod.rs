//! Session management.
//!
//! [`Tracker`] ties the pipeline together. It owns one [`FilterWindow`] per
//! active session, keyed by session id, all of them committing into a shared
//! [`TrackCommitter`]. Starting a session allocates an id from the store and
//! registers a window built from the current [`TrackingProfile`]. Stopping it
//! applies the [`TeardownPolicy`] to buffered samples, closes the track and
//! discards it if it is too small to matter.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tracefilter::sample::LocationSample;
//! use tracefilter::store::MemorySessionStore;
//! use tracefilter::tracker::{Tracker, TrackerSettings};
//!
//! let tracker = Tracker::new(Arc::new(MemorySessionStore::new()), TrackerSettings::default());
//! let session = tracker.start_session(false).unwrap();
//!
//! tracker
//!     .ingest(&session, LocationSample::new(38.7, -9.1).with_accuracy(5.0))
//!     .unwrap();
//!
//! let report = tracker.stop_session(&session).unwrap();
//! assert_eq!(report.dropped, 1);
//! assert!(!report.retained);
//! ```

mod committer;

pub use committer::TrackCommitter;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::activity::{ActivitySelector, DetectedActivity};
use crate::config::{ConfigFile, RelevancePolicy, TeardownPolicy, TrackingProfile};
use crate::filter::{Admission, FilterWindow, SampleSink};
use crate::sample::LocationSample;
use crate::store::{SessionStore, StorageError};
use crate::track::SpeedStats;

/// Errors raised by the tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No active session {0}")]
    UnknownSession(String),

    #[error("Session {0} is already active")]
    SessionAlreadyActive(String),
}

/// Tracker configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerSettings {
    pub profile: TrackingProfile,
    pub teardown: TeardownPolicy,
    pub relevance: RelevancePolicy,
}

impl TrackerSettings {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            profile: config.profile.clone(),
            teardown: config.session.teardown,
            relevance: config.session.relevance,
        }
    }

    pub fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn with_relevance(mut self, relevance: RelevancePolicy) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_profile(mut self, profile: TrackingProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// Outcome of stopping a session.
#[derive(Debug, Clone, PartialEq)]
pub struct StopReport {
    pub session_id: String,
    /// Buffered samples discarded at teardown.
    pub dropped: usize,
    /// Buffered samples committed at teardown.
    pub flushed: usize,
    /// Whether the track was kept in the store.
    pub retained: bool,
    pub distance_m: f64,
    /// Committed samples.
    pub samples: usize,
    pub elapsed_time_ms: i64,
    pub speed_stats: Option<SpeedStats>,
}

/// Session registry and pipeline entry point.
pub struct Tracker {
    store: Arc<dyn SessionStore>,
    settings: RwLock<TrackerSettings>,
    committer: Arc<TrackCommitter>,
    windows: DashMap<String, Arc<FilterWindow>>,
    // Serializes id allocation with session registration
    start_lock: Mutex<()>,
}

impl Tracker {
    pub fn new(store: Arc<dyn SessionStore>, settings: TrackerSettings) -> Self {
        let activity = Arc::new(ActivitySelector::new(
            settings.profile.activity_minimum_confidence,
        ));
        let committer = Arc::new(TrackCommitter::new(Arc::clone(&store), activity));

        Self {
            store,
            settings: RwLock::new(settings),
            committer,
            windows: DashMap::new(),
            start_lock: Mutex::new(()),
        }
    }

    /// Start a session under the next free local id.
    pub fn start_session(&self, is_valid: bool) -> Result<String, TrackerError> {
        let _guard = self.start_lock.lock();
        let session_id = self.store.next_session_id()?;
        self.register(&session_id, is_valid)?;
        Ok(session_id)
    }

    /// Start (or resume) a session under a given id.
    pub fn start_session_with_id(&self, session_id: &str, is_valid: bool) -> Result<(), TrackerError> {
        let _guard = self.start_lock.lock();
        self.register(session_id, is_valid)
    }

    fn register(&self, session_id: &str, is_valid: bool) -> Result<(), TrackerError> {
        if self.windows.contains_key(session_id) {
            return Err(TrackerError::SessionAlreadyActive(session_id.to_string()));
        }

        self.store.create_session(session_id, is_valid)?;
        self.committer.register(session_id, is_valid);

        let profile = self.settings.read().profile.clone();
        let sink: Arc<dyn SampleSink> = self.committer.clone();
        let window = FilterWindow::from_profile(session_id, &profile, sink);
        self.windows.insert(session_id.to_string(), Arc::new(window));

        info!(
            session = %session_id,
            is_valid,
            outlier_removal = profile.outlier_removal_enabled,
            "Tracking session started"
        );
        Ok(())
    }

    /// Feed a raw sample into a session's filter.
    pub fn ingest(&self, session_id: &str, sample: LocationSample) -> Result<Admission, TrackerError> {
        let window = self
            .windows
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TrackerError::UnknownSession(session_id.to_string()))?;

        Ok(window.add_sample(sample)?)
    }

    /// Feed an activity recognition report.
    ///
    /// Returns the newly selected activity, if the report changed it.
    pub fn observe_activity(&self, detections: &[DetectedActivity]) -> Option<DetectedActivity> {
        self.committer.activity().observe(detections)
    }

    pub fn current_activity(&self) -> Option<DetectedActivity> {
        self.committer.activity().current()
    }

    /// Stop a session.
    ///
    /// The window is unregistered first, so samples ingested concurrently
    /// for this session fail with [`TrackerError::UnknownSession`].
    pub fn stop_session(&self, session_id: &str) -> Result<StopReport, TrackerError> {
        let (_, window) = self
            .windows
            .remove(session_id)
            .ok_or_else(|| TrackerError::UnknownSession(session_id.to_string()))?;

        let (teardown, relevance) = {
            let settings = self.settings.read();
            (settings.teardown, settings.relevance)
        };

        let (dropped, flushed) = match teardown {
            TeardownPolicy::Drop => (window.clear_queue(), 0),
            TeardownPolicy::Flush => (0, window.flush()?),
        };

        let aggregator = self.committer.unregister(session_id).unwrap_or_default();
        let distance_m = aggregator.distance_m();
        let samples = aggregator.sample_count();

        self.store.close_session(session_id)?;

        let retained = relevance.is_relevant(distance_m, samples);
        if !retained {
            debug!(
                session = %session_id,
                distance_m,
                samples,
                "Track below relevance threshold, deleting"
            );
            if !self.store.delete_session(session_id)? {
                warn!(session = %session_id, "Irrelevant track was already gone");
            }
        }

        if self.windows.is_empty() {
            self.committer.activity().reset();
        }

        info!(
            session = %session_id,
            distance_m,
            samples,
            dropped,
            flushed,
            retained,
            "Tracking session stopped"
        );

        Ok(StopReport {
            session_id: session_id.to_string(),
            dropped,
            flushed,
            retained,
            distance_m,
            samples,
            elapsed_time_ms: aggregator.elapsed_time_ms(),
            speed_stats: aggregator.speed_stats(),
        })
    }

    /// Replace the profile and reconfigure every active window.
    pub fn update_profile(&self, profile: TrackingProfile) {
        for entry in self.windows.iter() {
            entry.value().apply_profile(&profile);
        }
        self.committer
            .activity()
            .set_minimum_confidence(profile.activity_minimum_confidence);
        self.settings.write().profile = profile;
        debug!(sessions = self.windows.len(), "Tracking profile updated");
    }

    pub fn set_teardown(&self, teardown: TeardownPolicy) {
        self.settings.write().teardown = teardown;
    }

    pub fn profile(&self) -> TrackingProfile {
        self.settings.read().profile.clone()
    }

    pub fn settings(&self) -> TrackerSettings {
        self.settings.read().clone()
    }

    /// Ids of active sessions, in no particular order.
    pub fn active_sessions(&self) -> Vec<String> {
        self.windows.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.windows.contains_key(session_id)
    }

    /// The filter window of an active session.
    pub fn window(&self, session_id: &str) -> Option<Arc<FilterWindow>> {
        self.windows
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("active_sessions", &self.windows.len())
            .field("settings", &*self.settings.read())
            .finish_non_exhaustive()
    }
}
