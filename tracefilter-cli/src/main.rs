//! TraceFilter CLI - Command-line interface
//!
//! Replays recorded location streams through the outlier filter and
//! inspects the tracks stored in the local database.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracefilter::logging::{default_log_dir, default_log_file, init_logging_with_level};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use commands::tracks::TracksCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "tracefilter")]
#[command(version, about = "Filter GPS outliers out of location tracks", long_about = None)]
struct Cli {
    /// Directory for the log file
    #[arg(long, global = true, default_value = default_log_dir())]
    log_dir: PathBuf,

    /// Log filtering decisions (rejections, evictions) to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines file of samples through the filter
    Replay(ReplayArgs),

    /// Inspect stored tracks
    Tracks {
        /// Track database (defaults to the one in config.ini)
        #[arg(long, global = true)]
        db: Option<PathBuf>,

        #[command(subcommand)]
        action: TracksCommands,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let _logging_guard = match init_logging_with_level(&cli.log_dir, default_log_file(), level) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Tracks { db, action } => commands::tracks::run(action, db),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        e.exit();
    }
}
