//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, and `config path`.

use clap::Subcommand;
use tracefilter::config::{config_file_path, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a default config.ini if none exists
    Init,

    /// Print the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init => run_init(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
    }
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if ConfigFile::ensure_exists_at(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("Config file already exists: {}", path.display());
    }
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let config = load_config();

    let profile_json = config
        .profile
        .to_json()
        .map_err(|e| CliError::Config(e.to_string()))?;

    print!("{}", config.to_ini_string());
    println!();
    println!("; Tracking profile as JSON:");
    println!("; {}", profile_json);
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
