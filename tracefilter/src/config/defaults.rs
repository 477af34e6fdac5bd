//! Default values for all configuration settings.

use std::path::PathBuf;

use super::file::config_directory;
use super::profile::TrackingProfile;
use super::settings::*;
use crate::activity::DEFAULT_MINIMUM_CONFIDENCE;
use crate::filter::DEFAULT_PASS_THROUGH_SPEED_MPS;

// =============================================================================
// [location]
// =============================================================================

/// Desired interval between location updates.
pub const DEFAULT_LOCATION_INTERVAL_MS: u64 = 3500;

/// Fastest interval the provider may deliver updates at.
pub const DEFAULT_LOCATION_FAST_INTERVAL_MS: u64 = 1500;

/// Minimum displacement between updates.
pub const DEFAULT_DISPLACEMENT_THRESHOLD_M: f32 = 2.0;

/// Accuracy radius above which a sample is an outlier.
pub const DEFAULT_MINIMUM_ACCURACY_M: f32 = 40.0;

/// Reported speed above which a sample is an outlier (200 km/h).
pub const DEFAULT_MAXIMUM_SPEED_MPS: f32 = 55.56;

// =============================================================================
// [activity]
// =============================================================================

/// Interval between activity recognition reports.
pub const DEFAULT_ACTIVITY_INTERVAL_MS: u64 = 3000;

// =============================================================================
// [session]
// =============================================================================

/// Tracks at or below this distance are discarded on stop.
pub const DEFAULT_MIN_TRACK_DISTANCE_M: f64 = 15.0;

/// Tracks with at most this many samples are discarded on stop.
pub const DEFAULT_MIN_TRACK_SAMPLES: usize = 5;

// =============================================================================
// [storage]
// =============================================================================

/// Database file name inside the config directory.
pub const DEFAULT_DATABASE_FILE: &str = "tracks.db";

pub fn default_database_path() -> PathBuf {
    config_directory().join(DEFAULT_DATABASE_FILE)
}

impl Default for TrackingProfile {
    fn default() -> Self {
        Self {
            location_interval_ms: DEFAULT_LOCATION_INTERVAL_MS,
            location_fast_interval_ms: DEFAULT_LOCATION_FAST_INTERVAL_MS,
            displacement_threshold_m: DEFAULT_DISPLACEMENT_THRESHOLD_M,
            minimum_accuracy_m: DEFAULT_MINIMUM_ACCURACY_M,
            maximum_speed_mps: DEFAULT_MAXIMUM_SPEED_MPS,
            activity_interval_ms: DEFAULT_ACTIVITY_INTERVAL_MS,
            activity_minimum_confidence: DEFAULT_MINIMUM_CONFIDENCE,
            outlier_removal_enabled: true,
            minimum_satellites: None,
            maximum_calculated_speed_mps: None,
            pass_through_speed_mps: DEFAULT_PASS_THROUGH_SPEED_MPS,
        }
    }
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self {
            min_distance_m: DEFAULT_MIN_TRACK_DISTANCE_M,
            min_samples: DEFAULT_MIN_TRACK_SAMPLES,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}
