//! Movement activity tags.
//!
//! The platform's activity recognizer reports a list of candidate activities,
//! each with a confidence percentage. The [`ActivitySelector`] keeps the most
//! recent acceptable detection so committed samples can be tagged with what
//! the user was doing when the fix was taken.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use tracing::debug;

/// Default minimum confidence (percent) for a detection to be accepted.
pub const DEFAULT_MINIMUM_CONFIDENCE: u8 = 75;

/// Kind of movement activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Vehicle,
    Cycling,
    OnFoot,
    Running,
    Still,
    Tilting,
    Walking,
    Unknown,
}

impl ActivityKind {
    /// Human readable name, as stored alongside samples.
    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityKind::Vehicle => "Vehicle",
            ActivityKind::Cycling => "Cycling",
            ActivityKind::OnFoot => "On Foot",
            ActivityKind::Running => "Running",
            ActivityKind::Still => "Still",
            ActivityKind::Tilting => "Tilting",
            ActivityKind::Walking => "Walking",
            ActivityKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ActivityKind {
    type Err = ();

    /// Parses display names case-insensitively, ignoring spaces and
    /// underscores (`"On Foot"`, `"on_foot"`, `"onfoot"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "vehicle" | "invehicle" => Ok(ActivityKind::Vehicle),
            "cycling" | "onbicycle" => Ok(ActivityKind::Cycling),
            "onfoot" => Ok(ActivityKind::OnFoot),
            "running" => Ok(ActivityKind::Running),
            "still" => Ok(ActivityKind::Still),
            "tilting" => Ok(ActivityKind::Tilting),
            "walking" => Ok(ActivityKind::Walking),
            "unknown" => Ok(ActivityKind::Unknown),
            _ => Err(()),
        }
    }
}

/// One candidate activity reported by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedActivity {
    pub kind: ActivityKind,
    /// Confidence percentage (0-100).
    pub confidence: u8,
}

impl DetectedActivity {
    pub fn new(kind: ActivityKind, confidence: u8) -> Self {
        Self {
            kind,
            confidence: confidence.min(100),
        }
    }

    /// Whether this detection reaches the given minimum confidence.
    pub fn is_acceptable(&self, minimum_confidence: u8) -> bool {
        self.confidence >= minimum_confidence
    }
}

/// Keeps the current activity, updated from recognizer reports.
///
/// Shared between the tracker (which feeds detections) and the committer
/// (which tags committed samples), hence the interior lock.
#[derive(Debug)]
pub struct ActivitySelector {
    minimum_confidence: RwLock<u8>,
    current: RwLock<Option<DetectedActivity>>,
}

impl Default for ActivitySelector {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMUM_CONFIDENCE)
    }
}

impl ActivitySelector {
    pub fn new(minimum_confidence: u8) -> Self {
        Self {
            minimum_confidence: RwLock::new(minimum_confidence),
            current: RwLock::new(None),
        }
    }

    /// Pick the most confident detection, if it is confident enough.
    pub fn select(&self, detections: &[DetectedActivity]) -> Option<DetectedActivity> {
        let best = detections.iter().max_by_key(|d| d.confidence)?;
        let minimum = *self.minimum_confidence.read();

        if !best.is_acceptable(minimum) {
            debug!(
                activity = %best.kind,
                confidence = best.confidence,
                minimum,
                "Activity confidence too low, keeping the previous one"
            );
            return None;
        }

        Some(*best)
    }

    /// Feed a recognizer report. Returns the new current activity when it changed.
    pub fn observe(&self, detections: &[DetectedActivity]) -> Option<DetectedActivity> {
        let selected = self.select(detections)?;
        *self.current.write() = Some(selected);
        Some(selected)
    }

    /// The current activity, if any detection has been accepted yet.
    pub fn current(&self) -> Option<DetectedActivity> {
        *self.current.read()
    }

    pub fn minimum_confidence(&self) -> u8 {
        *self.minimum_confidence.read()
    }

    pub fn set_minimum_confidence(&self, minimum_confidence: u8) {
        *self.minimum_confidence.write() = minimum_confidence;
    }

    /// Forget the current activity (session teardown).
    pub fn reset(&self) {
        *self.current.write() = None;
    }
}
