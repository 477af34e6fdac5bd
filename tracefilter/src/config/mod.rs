//! Configuration.
//!
//! - [`TrackingProfile`]: acquisition and filtering parameters, with the JSON
//!   encoding used by the settings store.
//! - [`ConfigFile`]: the user's `~/.tracefilter/config.ini`, covering the
//!   profile plus session and storage settings.
//!
//! # Example
//!
//! ```
//! use tracefilter::config::{ConfigFile, TeardownPolicy};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.profile.minimum_accuracy_m, 40.0);
//! assert_eq!(config.session.teardown, TeardownPolicy::Drop);
//! ```

mod defaults;
mod file;
mod parser;
mod profile;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use profile::TrackingProfile;
pub use settings::{ConfigFile, RelevancePolicy, SessionSettings, StorageSettings, TeardownPolicy};
