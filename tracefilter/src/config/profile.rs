//! Tracking profile: acquisition and filtering parameters.
//!
//! The profile is shared with the settings store as JSON:
//!
//! ```text
//! {"location": {"interval", "fastInterval", "accuracy", "speed",
//!               "displacementThreshold", "removeOutliers", ...},
//!  "activity": {"interval", "confidence"}}
//! ```
//!
//! Missing keys fall back to the defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters controlling acquisition and outlier filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingProfile {
    /// Desired interval between location updates.
    pub location_interval_ms: u64,
    /// Fastest interval the provider may deliver updates at.
    pub location_fast_interval_ms: u64,
    /// Minimum displacement between updates.
    pub displacement_threshold_m: f32,
    /// Accuracy radius above which a sample is an outlier.
    pub minimum_accuracy_m: f32,
    /// Reported speed above which a sample is an outlier.
    pub maximum_speed_mps: f32,
    /// Interval between activity recognition reports.
    pub activity_interval_ms: u64,
    /// Minimum confidence for an activity detection to be accepted.
    pub activity_minimum_confidence: u8,
    /// Whether the outlier filter runs at all.
    pub outlier_removal_enabled: bool,
    /// Enables the satellite rule with this minimum count.
    pub minimum_satellites: Option<u32>,
    /// Enables the calculated-speed rule with this threshold.
    pub maximum_calculated_speed_mps: Option<f64>,
    /// Threshold of the retroactive pass-through check.
    pub pass_through_speed_mps: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LocationJson {
    interval: u64,
    fast_interval: u64,
    accuracy: f32,
    speed: f32,
    displacement_threshold: f32,
    remove_outliers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    satellites: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calculated_speed: Option<f64>,
    pass_through_speed: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct ActivityJson {
    interval: u64,
    confidence: u8,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct ProfileJson {
    location: LocationJson,
    activity: ActivityJson,
}

impl Default for LocationJson {
    fn default() -> Self {
        ProfileJson::from(&TrackingProfile::default()).location
    }
}

impl Default for ActivityJson {
    fn default() -> Self {
        ProfileJson::from(&TrackingProfile::default()).activity
    }
}

impl From<&TrackingProfile> for ProfileJson {
    fn from(profile: &TrackingProfile) -> Self {
        Self {
            location: LocationJson {
                interval: profile.location_interval_ms,
                fast_interval: profile.location_fast_interval_ms,
                accuracy: profile.minimum_accuracy_m,
                speed: profile.maximum_speed_mps,
                displacement_threshold: profile.displacement_threshold_m,
                remove_outliers: profile.outlier_removal_enabled,
                satellites: profile.minimum_satellites,
                calculated_speed: profile.maximum_calculated_speed_mps,
                pass_through_speed: profile.pass_through_speed_mps,
            },
            activity: ActivityJson {
                interval: profile.activity_interval_ms,
                confidence: profile.activity_minimum_confidence,
            },
        }
    }
}

impl From<ProfileJson> for TrackingProfile {
    fn from(json: ProfileJson) -> Self {
        Self {
            location_interval_ms: json.location.interval,
            location_fast_interval_ms: json.location.fast_interval,
            displacement_threshold_m: json.location.displacement_threshold,
            minimum_accuracy_m: json.location.accuracy,
            maximum_speed_mps: json.location.speed,
            activity_interval_ms: json.activity.interval,
            activity_minimum_confidence: json.activity.confidence,
            outlier_removal_enabled: json.location.remove_outliers,
            minimum_satellites: json.location.satellites,
            maximum_calculated_speed_mps: json.location.calculated_speed,
            pass_through_speed_mps: json.location.pass_through_speed,
        }
    }
}

impl TrackingProfile {
    /// Encode in the settings-store JSON layout.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(ProfileJson::from(self))
    }

    /// Decode from the settings-store JSON layout.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let json: ProfileJson = serde_json::from_value(value)?;
        Ok(json.into())
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let json: ProfileJson = serde_json::from_str(s)?;
        Ok(json.into())
    }

    pub fn with_outlier_removal(mut self, enabled: bool) -> Self {
        self.outlier_removal_enabled = enabled;
        self
    }
}
