//! Settings structs for the configuration sections.
//!
//! `[location]` and `[activity]` map onto [`TrackingProfile`]; the other
//! sections have their own structs here. Pure data, no parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::profile::TrackingProfile;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// `[location]` and `[activity]`
    pub profile: TrackingProfile,
    /// `[session]`
    pub session: SessionSettings,
    /// `[storage]`
    pub storage: StorageSettings,
}

/// What happens to buffered samples when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Discard samples still held in the filter window.
    #[default]
    Drop,
    /// Commit samples still held in the filter window.
    Flush,
}

impl fmt::Display for TeardownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownPolicy::Drop => f.write_str("drop"),
            TeardownPolicy::Flush => f.write_str("flush"),
        }
    }
}

impl FromStr for TeardownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(TeardownPolicy::Drop),
            "flush" => Ok(TeardownPolicy::Flush),
            other => Err(format!("unknown teardown policy '{}'", other)),
        }
    }
}

/// Minimum size for a stopped track to be kept.
///
/// A track is discarded when its distance is at most `min_distance_m`
/// or it holds at most `min_samples` samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevancePolicy {
    pub min_distance_m: f64,
    pub min_samples: usize,
}

impl RelevancePolicy {
    /// Keep every track holding at least one sample.
    pub fn keep_all() -> Self {
        Self {
            min_distance_m: f64::NEG_INFINITY,
            min_samples: 0,
        }
    }

    pub fn is_relevant(&self, distance_m: f64, samples: usize) -> bool {
        distance_m > self.min_distance_m && samples > self.min_samples
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSettings {
    pub teardown: TeardownPolicy,
    pub relevance: RelevancePolicy,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// SQLite database file.
    pub database: PathBuf,
}
