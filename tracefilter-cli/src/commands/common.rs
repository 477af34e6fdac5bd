//! Common utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use tracefilter::config::ConfigFile;
use tracefilter::store::SqliteSessionStore;

use crate::error::CliError;

/// Load config.ini, falling back to defaults when it is missing or broken.
pub fn load_config() -> ConfigFile {
    match ConfigFile::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable config file");
            ConfigFile::default()
        }
    }
}

/// The database to use: the explicit one, else the configured one.
pub fn database_path(explicit: Option<PathBuf>, config: &ConfigFile) -> PathBuf {
    explicit.unwrap_or_else(|| config.storage.database.clone())
}

/// Open a track database, creating its directory if needed.
pub fn open_database(path: &Path) -> Result<SqliteSessionStore, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| CliError::FileRead {
            path: parent.to_path_buf(),
            error,
        })?;
    }
    Ok(SqliteSessionStore::open(path)?)
}

/// Format a duration in milliseconds as `h:mm:ss`.
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let total_secs = elapsed_ms.max(0) / 1000;
    format!(
        "{}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Format a distance in meters, switching to kilometers past 1 km.
pub fn format_distance(distance_m: f64) -> String {
    if distance_m >= 1000.0 {
        format!("{:.2} km", distance_m / 1000.0)
    } else {
        format!("{:.0} m", distance_m)
    }
}
