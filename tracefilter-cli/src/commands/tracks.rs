//! Stored track management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use tracefilter::sample::codec;
use tracefilter::store::{SessionStore, SqliteSessionStore};
use tracefilter::track::Track;

use super::common::{database_path, format_distance, format_elapsed, load_config, open_database};
use crate::error::CliError;

/// Track subcommands.
#[derive(Debug, Subcommand)]
pub enum TracksCommands {
    /// List stored tracks
    List {
        /// Only show closed tracks
        #[arg(long)]
        closed: bool,
    },

    /// Show one track's statistics
    Show {
        /// Session id
        id: String,
    },

    /// Print a track's samples as JSON Lines
    Export {
        /// Session id
        id: String,
    },

    /// Rename a track to a remote session id, marking it valid
    Rename {
        /// Current session id
        id: String,
        /// New session id
        new_id: String,
    },

    /// Delete a track and its samples
    Delete {
        /// Session id
        id: String,
    },
}

/// Run a tracks subcommand.
pub fn run(command: TracksCommands, db: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config();
    let store = open_database(&database_path(db, &config))?;

    match command {
        TracksCommands::List { closed } => run_list(&store, closed),
        TracksCommands::Show { id } => run_show(&store, &id),
        TracksCommands::Export { id } => run_export(&store, &id),
        TracksCommands::Rename { id, new_id } => {
            if !store.rename_session(&id, &new_id)? {
                return Err(CliError::TrackNotFound(id));
            }
            println!("Renamed {} -> {}", id, new_id);
            Ok(())
        }
        TracksCommands::Delete { id } => {
            if !store.delete_session(&id)? {
                return Err(CliError::TrackNotFound(id));
            }
            println!("Deleted track {}", id);
            Ok(())
        }
    }
}

fn run_list(store: &SqliteSessionStore, closed_only: bool) -> Result<(), CliError> {
    let summaries: Vec<_> = store
        .list_summaries()?
        .into_iter()
        .filter(|s| !closed_only || s.is_closed)
        .collect();

    if summaries.is_empty() {
        println!("No tracks stored.");
        return Ok(());
    }

    println!(
        "{:<16} {:<8} {:<6} {:>10} {:>10}",
        "SESSION", "STATE", "VALID", "DISTANCE", "ELAPSED"
    );
    for summary in &summaries {
        println!(
            "{:<16} {:<8} {:<6} {:>10} {:>10}",
            summary.session_id,
            if summary.is_closed { "closed" } else { "open" },
            if summary.is_valid { "yes" } else { "no" },
            format_distance(summary.distance_m),
            format_elapsed(summary.elapsed_time_ms),
        );
    }
    println!();
    println!("{} track(s)", summaries.len());
    Ok(())
}

fn load(store: &SqliteSessionStore, id: &str) -> Result<Track, CliError> {
    store
        .load_track(id)?
        .ok_or_else(|| CliError::TrackNotFound(id.to_string()))
}

fn run_show(store: &SqliteSessionStore, id: &str) -> Result<(), CliError> {
    let track = load(store, id)?;

    println!("Track {}", track.session_id);
    println!("  State:    {}", if track.is_closed { "closed" } else { "open" });
    println!("  Valid:    {}", if track.is_valid { "yes" } else { "no" });
    println!("  Samples:  {}", track.len());
    println!("  Distance: {}", format_distance(track.distance_m));
    println!("  Elapsed:  {}", format_elapsed(track.elapsed_time_ms()));
    if let (Some(start), Some(end)) = (track.start_time(), track.end_time()) {
        println!("  Started:  {}", start.to_rfc3339());
        println!("  Ended:    {}", end.to_rfc3339());
    }
    if let Some(stats) = track.speed_stats() {
        println!("  Speed:    {}", stats);
    }
    Ok(())
}

fn run_export(store: &SqliteSessionStore, id: &str) -> Result<(), CliError> {
    let track = load(store, id)?;
    for sample in &track.samples {
        println!("{}", codec::to_json(sample));
    }
    Ok(())
}
