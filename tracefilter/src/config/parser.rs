//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();
    let profile = &mut config.profile;

    // [location] section
    if let Some(section) = ini.section(Some("location")) {
        let s = Section::new("location", section);
        if let Some(v) = s.parse("interval", "must be a positive integer (milliseconds)")? {
            profile.location_interval_ms = v;
        }
        if let Some(v) = s.parse("fast_interval", "must be a positive integer (milliseconds)")? {
            profile.location_fast_interval_ms = v;
        }
        if let Some(v) = s.parse_non_negative("displacement_threshold", "meters")? {
            profile.displacement_threshold_m = v as f32;
        }
        if let Some(v) = s.parse_non_negative("minimum_accuracy", "meters")? {
            profile.minimum_accuracy_m = v as f32;
        }
        if let Some(v) = s.parse_non_negative("maximum_speed", "m/s")? {
            profile.maximum_speed_mps = v as f32;
        }
        if let Some(v) = s.parse_non_negative("pass_through_speed", "m/s")? {
            profile.pass_through_speed_mps = v;
        }
        if let Some(v) = s.get("minimum_satellites") {
            profile.minimum_satellites = if v.is_empty() {
                None
            } else {
                Some(s.parse_value("minimum_satellites", v, "must be a positive integer or empty")?)
            };
        }
        if let Some(v) = s.get("maximum_calculated_speed") {
            profile.maximum_calculated_speed_mps = if v.is_empty() {
                None
            } else {
                let parsed: f64 =
                    s.parse_value("maximum_calculated_speed", v, "must be a number (m/s) or empty")?;
                if parsed < 0.0 {
                    return Err(s.invalid("maximum_calculated_speed", v, "must not be negative"));
                }
                Some(parsed)
            };
        }
        if let Some(v) = s.get("remove_outliers") {
            profile.outlier_removal_enabled = s.parse_bool("remove_outliers", v)?;
        }
    }

    // [activity] section
    if let Some(section) = ini.section(Some("activity")) {
        let s = Section::new("activity", section);
        if let Some(v) = s.parse("interval", "must be a positive integer (milliseconds)")? {
            profile.activity_interval_ms = v;
        }
        if let Some(v) = s.get("minimum_confidence") {
            let parsed: u8 = s.parse_value("minimum_confidence", v, "must be between 0 and 100")?;
            if parsed > 100 {
                return Err(s.invalid("minimum_confidence", v, "must be between 0 and 100"));
            }
            profile.activity_minimum_confidence = parsed;
        }
    }

    // [session] section
    if let Some(section) = ini.section(Some("session")) {
        let s = Section::new("session", section);
        if let Some(v) = s.get("teardown") {
            config.session.teardown = s.parse_value("teardown", v, "must be 'drop' or 'flush'")?;
        }
        if let Some(v) = s.parse_non_negative("min_track_distance", "meters")? {
            config.session.relevance.min_distance_m = v;
        }
        if let Some(v) = s.parse("min_track_samples", "must be a non-negative integer")? {
            config.session.relevance.min_samples = v;
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        let s = Section::new("storage", section);
        if let Some(v) = s.get("database") {
            if !v.is_empty() {
                config.storage.database = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// One INI section with error context for its values.
struct Section<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, properties: &'a Properties) -> Self {
        Self { name, properties }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key).map(str::trim)
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_value<T: FromStr>(&self, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError> {
        value.parse().map_err(|_| self.invalid(key, value, reason))
    }

    fn parse<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        self.get(key)
            .map(|v| self.parse_value(key, v, reason))
            .transpose()
    }

    fn parse_non_negative(&self, key: &str, unit: &str) -> Result<Option<f64>, ConfigFileError> {
        let Some(v) = self.get(key) else {
            return Ok(None);
        };
        let reason = format!("must be a non-negative number ({})", unit);
        let parsed: f64 = self.parse_value(key, v, &reason)?;
        if !parsed.is_finite() || parsed < 0.0 {
            return Err(self.invalid(key, v, &reason));
        }
        Ok(Some(parsed))
    }

    fn parse_bool(&self, key: &str, value: &str) -> Result<bool, ConfigFileError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(self.invalid(key, value, "must be true or false")),
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
