//! Boundary encodings for [`LocationSample`].
//!
//! Stored samples are split in two parts:
//!
//! - **main attributes**: `latitude`, `longitude`, `timestamp`, stored as
//!   their own columns;
//! - **secondary attributes**: a JSON object with accuracy, speed, bearing,
//!   altitude, monotonic time, provider, activity and any provider extras,
//!   stored as one serialized string.
//!
//! The interchange form used by the CLI replays is the main attributes plus
//! an `attributes` member holding the secondary object (either inline or as
//! a serialized string).

use serde_json::{Map, Value};
use thiserror::Error;

use super::{ActivityTag, LocationSample};

/// Key names shared by the storage row and the interchange form.
pub mod keys {
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const TIMESTAMP: &str = "timestamp";
    pub const ATTRIBUTES: &str = "attributes";

    pub const ACCURACY: &str = "accuracy";
    pub const SPEED: &str = "speed";
    pub const BEARING: &str = "bearing";
    pub const ALTITUDE: &str = "altitude";
    pub const ELAPSED_NANOS: &str = "elapsedNanos";
    pub const PROVIDER: &str = "provider";
    pub const ACTIVITY: &str = "activity";

    pub const ACTIVITY_TYPE: &str = "type";
    pub const ACTIVITY_CONFIDENCE: &str = "confidence";

    /// Secondary keys owned by the sample itself (everything else is an extra).
    pub const SECONDARY: [&str; 7] = [
        ACCURACY,
        SPEED,
        BEARING,
        ALTITUDE,
        ELAPSED_NANOS,
        PROVIDER,
        ACTIVITY,
    ];
}

/// Errors decoding an encoded sample.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not valid JSON.
    #[error("Invalid sample JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required main attribute is missing or has the wrong type.
    #[error("Missing or invalid field '{0}'")]
    MissingField(&'static str),

    /// The secondary attributes are not a JSON object.
    #[error("Sample attributes must be a JSON object")]
    AttributesNotObject,
}

/// Build the secondary attribute object for a sample.
pub fn secondary_attributes(sample: &LocationSample) -> Map<String, Value> {
    let mut attributes = Map::new();

    // Extras first so the sample's own fields win on key collisions
    for (key, value) in &sample.extras {
        attributes.insert(key.clone(), value.clone());
    }

    attributes.insert(keys::ACCURACY.into(), Value::from(sample.accuracy));
    attributes.insert(keys::SPEED.into(), Value::from(sample.speed));
    attributes.insert(keys::BEARING.into(), Value::from(sample.bearing));
    attributes.insert(keys::ALTITUDE.into(), Value::from(sample.altitude));
    attributes.insert(keys::ELAPSED_NANOS.into(), Value::from(sample.elapsed_nanos));
    attributes.insert(keys::PROVIDER.into(), Value::from(sample.provider.clone()));
    attributes.insert(keys::ACTIVITY.into(), encode_activity(&sample.activity));

    attributes
}

/// Serialize the secondary attributes to the stored string form.
pub fn encode_attributes(sample: &LocationSample) -> String {
    Value::Object(secondary_attributes(sample)).to_string()
}

/// Overlay secondary attributes onto a sample.
///
/// Missing keys leave the sample's current values in place; unknown keys
/// become extras.
pub fn apply_attributes(sample: &mut LocationSample, attributes: &Map<String, Value>) {
    if let Some(v) = attributes.get(keys::ACCURACY).and_then(Value::as_f64) {
        sample.accuracy = (v as f32).max(0.0);
    }
    if let Some(v) = attributes.get(keys::SPEED).and_then(Value::as_f64) {
        sample.speed = (v as f32).max(0.0);
    }
    if let Some(v) = attributes.get(keys::BEARING).and_then(Value::as_f64) {
        sample.bearing = v as f32;
    }
    if let Some(v) = attributes.get(keys::ALTITUDE).and_then(Value::as_f64) {
        sample.altitude = v;
    }
    if let Some(v) = attributes.get(keys::ELAPSED_NANOS).and_then(Value::as_i64) {
        sample.elapsed_nanos = v;
    }
    if let Some(v) = attributes.get(keys::PROVIDER).and_then(Value::as_str) {
        sample.provider = v.to_string();
    }
    if let Some(v) = attributes.get(keys::ACTIVITY) {
        sample.activity = decode_activity(v);
    }

    for (key, value) in attributes {
        if !keys::SECONDARY.contains(&key.as_str()) {
            sample.extras.insert(key.clone(), value.clone());
        }
    }
}

/// Rebuild a sample from its stored row.
pub fn decode_sample(
    latitude: f64,
    longitude: f64,
    timestamp_ms: i64,
    attributes: &str,
) -> Result<LocationSample, CodecError> {
    let mut sample = LocationSample::new(latitude, longitude).with_timestamp_ms(timestamp_ms);

    if attributes.trim().is_empty() {
        return Ok(sample);
    }

    match serde_json::from_str::<Value>(attributes)? {
        Value::Object(map) => {
            apply_attributes(&mut sample, &map);
            Ok(sample)
        }
        _ => Err(CodecError::AttributesNotObject),
    }
}

/// Interchange form: main attributes plus the serialized secondary attributes.
pub fn to_json(sample: &LocationSample) -> Value {
    let mut object = Map::new();
    object.insert(keys::LATITUDE.into(), Value::from(sample.latitude));
    object.insert(keys::LONGITUDE.into(), Value::from(sample.longitude));
    object.insert(keys::TIMESTAMP.into(), Value::from(sample.timestamp_ms));
    object.insert(keys::ATTRIBUTES.into(), Value::from(encode_attributes(sample)));
    Value::Object(object)
}

/// Parse the interchange form.
///
/// `attributes` may be an inline object or a serialized string, and may be
/// absent entirely.
pub fn from_json(value: &Value) -> Result<LocationSample, CodecError> {
    let latitude = value
        .get(keys::LATITUDE)
        .and_then(Value::as_f64)
        .ok_or(CodecError::MissingField(keys::LATITUDE))?;
    let longitude = value
        .get(keys::LONGITUDE)
        .and_then(Value::as_f64)
        .ok_or(CodecError::MissingField(keys::LONGITUDE))?;
    let timestamp = value
        .get(keys::TIMESTAMP)
        .and_then(Value::as_i64)
        .ok_or(CodecError::MissingField(keys::TIMESTAMP))?;

    match value.get(keys::ATTRIBUTES) {
        None | Some(Value::Null) => decode_sample(latitude, longitude, timestamp, ""),
        Some(Value::String(encoded)) => decode_sample(latitude, longitude, timestamp, encoded),
        Some(Value::Object(map)) => {
            let mut sample = LocationSample::new(latitude, longitude).with_timestamp_ms(timestamp);
            apply_attributes(&mut sample, map);
            Ok(sample)
        }
        Some(_) => Err(CodecError::AttributesNotObject),
    }
}

/// Parse one line of a JSON-lines replay file.
pub fn from_json_str(line: &str) -> Result<LocationSample, CodecError> {
    let value: Value = serde_json::from_str(line)?;
    from_json(&value)
}

fn encode_activity(activity: &ActivityTag) -> Value {
    match activity {
        ActivityTag::Unknown => Value::from("unknown"),
        ActivityTag::Label(label) => Value::from(label.clone()),
        ActivityTag::Detected { kind, confidence } => {
            let mut object = Map::new();
            object.insert(keys::ACTIVITY_TYPE.into(), Value::from(kind.display_name()));
            object.insert(keys::ACTIVITY_CONFIDENCE.into(), Value::from(*confidence));
            Value::Object(object)
        }
    }
}

fn decode_activity(value: &Value) -> ActivityTag {
    match value {
        Value::Object(map) => decode_detected(map),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("unknown")
                || trimmed.eq_ignore_ascii_case("null")
            {
                return ActivityTag::Unknown;
            }
            // Older rows carry the detection as a JSON string
            if trimmed.starts_with('{') {
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                    return decode_detected(&map);
                }
            }
            ActivityTag::Label(trimmed.to_string())
        }
        _ => ActivityTag::Unknown,
    }
}

fn decode_detected(map: &Map<String, Value>) -> ActivityTag {
    let label = map.get(keys::ACTIVITY_TYPE).and_then(Value::as_str);
    let confidence = map
        .get(keys::ACTIVITY_CONFIDENCE)
        .and_then(Value::as_u64)
        .map(|c| c.min(100) as u8);

    match (label, confidence) {
        (Some(label), Some(confidence)) => match label.parse() {
            Ok(kind) => ActivityTag::Detected { kind, confidence },
            Err(()) => ActivityTag::Label(label.to_string()),
        },
        (Some(label), None) => ActivityTag::Label(label.to_string()),
        _ => ActivityTag::Unknown,
    }
}
