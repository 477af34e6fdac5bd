//! Location samples.
//!
//! A [`LocationSample`] is one positional observation as delivered by the
//! platform location provider: coordinates, quality metadata, two clocks and
//! an open bag of provider-specific extras.
//!
//! # Clocks
//!
//! - `timestamp_ms` is wall-clock time (ms since the Unix epoch). It is what
//!   gets persisted and displayed.
//! - `elapsed_nanos` is a monotonic clock reading. All interval math in the
//!   filter rules uses it, so wall-clock jumps cannot produce bogus speeds.
//!
//! Samples of one stream must arrive with non-decreasing `elapsed_nanos`.
//! This is a precondition of the ingestion contract and is not checked.
//!
//! Storage and wire encodings live in [`codec`], not on the type itself.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::activity::{ActivityKind, DetectedActivity};
use crate::geo::GeoPoint;

/// Extras key holding the number of satellites used for the fix.
pub const SATELLITES_EXTRA: &str = "satellites";

/// Provider tag used when the source did not name one.
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// Activity the user was performing when a sample was taken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivityTag {
    /// No activity information.
    #[default]
    Unknown,
    /// Free-form label from a source that does not report confidence.
    Label(String),
    /// Structured detection from the activity recognizer.
    Detected { kind: ActivityKind, confidence: u8 },
}

impl ActivityTag {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ActivityTag::Unknown)
    }
}

impl From<DetectedActivity> for ActivityTag {
    fn from(activity: DetectedActivity) -> Self {
        ActivityTag::Detected {
            kind: activity.kind,
            confidence: activity.confidence,
        }
    }
}

impl fmt::Display for ActivityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityTag::Unknown => f.write_str("unknown"),
            ActivityTag::Label(label) => f.write_str(label),
            ActivityTag::Detected { kind, confidence } => write!(f, "{} ({}%)", kind, confidence),
        }
    }
}

/// One positional observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Horizontal accuracy radius in meters (never negative).
    pub accuracy: f32,
    /// Reported speed in m/s (never negative).
    pub speed: f32,
    /// Bearing in degrees.
    pub bearing: f32,
    /// Wall-clock time, ms since the Unix epoch.
    pub timestamp_ms: i64,
    /// Monotonic clock reading in nanoseconds.
    pub elapsed_nanos: i64,
    /// Provider tag (e.g. "gps", "fused").
    pub provider: String,
    /// Activity tag.
    pub activity: ActivityTag,
    /// Provider-specific extras (e.g. satellite count).
    pub extras: BTreeMap<String, Value>,
}

impl LocationSample {
    /// Create a sample at the given coordinates with all other fields zeroed.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            accuracy: 0.0,
            speed: 0.0,
            bearing: 0.0,
            timestamp_ms: 0,
            elapsed_nanos: 0,
            provider: UNKNOWN_PROVIDER.to_string(),
            activity: ActivityTag::Unknown,
            extras: BTreeMap::new(),
        }
    }

    /// Set the accuracy radius. Negative values are clamped to zero.
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = accuracy.max(0.0);
        self
    }

    /// Set the reported speed. Negative values are clamped to zero.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_bearing(mut self, bearing: f32) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_elapsed_nanos(mut self, elapsed_nanos: i64) -> Self {
        self.elapsed_nanos = elapsed_nanos;
        self
    }

    /// Set both clocks from a single offset in milliseconds.
    ///
    /// Convenient for replayed or synthetic streams where the wall clock and
    /// the monotonic clock advance together.
    pub fn at_millis(self, millis: i64) -> Self {
        self.with_timestamp_ms(millis)
            .with_elapsed_nanos(millis.saturating_mul(1_000_000))
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_activity(mut self, activity: ActivityTag) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn with_satellites(self, count: u32) -> Self {
        self.with_extra(SATELLITES_EXTRA, Value::from(count))
    }

    /// Satellite count, if the provider reported one as an integer.
    pub fn satellites(&self) -> Option<u64> {
        self.extras.get(SATELLITES_EXTRA).and_then(Value::as_u64)
    }

    /// Seconds elapsed on the monotonic clock since `earlier`.
    ///
    /// Negative when the samples are out of order.
    pub fn seconds_since(&self, earlier: &LocationSample) -> f64 {
        (self.elapsed_nanos - earlier.elapsed_nanos) as f64 / 1e9
    }
}

impl GeoPoint for LocationSample {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for LocationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}) ±{:.1}m {:.1}m/s @{}",
            self.latitude, self.longitude, self.accuracy, self.speed, self.timestamp_ms
        )
    }
}
