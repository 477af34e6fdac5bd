//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use tracefilter::config::ConfigFileError;
use tracefilter::sample::codec::CodecError;
use tracefilter::store::StorageError;
use tracefilter::tracker::TrackerError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read or write the config file
    ConfigFile(ConfigFileError),
    /// Failed to open or query the track database
    Storage(StorageError),
    /// Tracking session error
    Tracker(TrackerError),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Malformed sample in a replay input
    Parse { line: usize, error: CodecError },
    /// No stored track with this session id
    TrackNotFound(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Parse { .. } => {
                eprintln!();
                eprintln!("Each input line must be a JSON object such as:");
                eprintln!(r#"  {{"latitude": 38.7369, "longitude": -9.1426, "timestamp": 1700000000000}}"#);
                eprintln!("Run without --strict to skip malformed lines.");
            }
            CliError::TrackNotFound(_) => {
                eprintln!();
                eprintln!("Use 'tracefilter tracks list' to see stored tracks.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Storage(e) => write!(f, "Track database error: {}", e),
            CliError::Tracker(e) => write!(f, "Tracking error: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::Parse { line, error } => write!(f, "Line {}: {}", line, error),
            CliError::TrackNotFound(id) => write!(f, "No track stored for session '{}'", id),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Storage(e) => Some(e),
            CliError::Tracker(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Parse { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Storage(e)
    }
}

impl From<TrackerError> for CliError {
    fn from(e: TrackerError) -> Self {
        CliError::Tracker(e)
    }
}
