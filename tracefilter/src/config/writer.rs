//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let profile = &config.profile;
    let minimum_satellites = profile
        .minimum_satellites
        .map(|v| v.to_string())
        .unwrap_or_default();
    let maximum_calculated_speed = profile
        .maximum_calculated_speed_mps
        .map(|v| v.to_string())
        .unwrap_or_default();

    format!(
        r#"[location]
; Desired interval between location updates in milliseconds (default: 3500)
interval = {}
; Fastest interval the provider may deliver updates at, in milliseconds (default: 1500)
fast_interval = {}
; Minimum displacement between updates in meters (default: 2)
displacement_threshold = {}
; Samples with an accuracy radius above this many meters are outliers (default: 40)
minimum_accuracy = {}
; Samples reporting a speed above this many m/s are outliers (default: 55.56, i.e. 200 km/h)
maximum_speed = {}
; Samples with fewer satellites are outliers. Empty disables the check.
minimum_satellites = {}
; Samples whose speed from the previous sample exceeds this many m/s are outliers.
; Empty disables the check.
maximum_calculated_speed = {}
; Buffered samples are discarded when the path through them is faster than
; this many m/s (default: 50)
pass_through_speed = {}
; Run the outlier filter (default: true). When false, every sample is kept.
remove_outliers = {}

[activity]
; Interval between activity recognition reports in milliseconds (default: 3000)
interval = {}
; Detections below this confidence percentage are ignored (default: 75)
minimum_confidence = {}

[session]
; What to do with samples still buffered when a session stops:
;   drop  - discard them (default)
;   flush - commit them to the track
teardown = {}
; Tracks at or below this distance in meters are discarded on stop (default: 15)
min_track_distance = {}
; Tracks with at most this many samples are discarded on stop (default: 5)
min_track_samples = {}

[storage]
; SQLite database holding the tracks (default: ~/.tracefilter/tracks.db)
database = {}
"#,
        profile.location_interval_ms,
        profile.location_fast_interval_ms,
        profile.displacement_threshold_m,
        profile.minimum_accuracy_m,
        profile.maximum_speed_mps,
        minimum_satellites,
        maximum_calculated_speed,
        profile.pass_through_speed_mps,
        profile.outlier_removal_enabled,
        profile.activity_interval_ms,
        profile.activity_minimum_confidence,
        config.session.teardown,
        config.session.relevance.min_distance_m,
        config.session.relevance.min_samples,
        config.storage.database.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_ini;
    use crate::config::TeardownPolicy;
    use ini::Ini;
    use std::path::PathBuf;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.profile.minimum_accuracy_m = 22.5;
        config.profile.minimum_satellites = Some(5);
        config.session.teardown = TeardownPolicy::Flush;
        config.storage.database = PathBuf::from("/var/lib/tracefilter/tracks.db");

        let written = to_config_string(&config);
        let parsed = parse_ini(&Ini::load_from_str(&written).unwrap()).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_defaults_leave_optional_rules_empty() {
        let written = to_config_string(&ConfigFile::default());
        assert!(written.contains("minimum_satellites = \n"));
        assert!(written.contains("teardown = drop"));
    }
}
