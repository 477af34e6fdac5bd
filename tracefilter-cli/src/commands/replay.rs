//! Replay a recorded location stream through the filter.
//!
//! The input is JSON Lines: one sample per line in the interchange form
//! (`latitude`, `longitude`, `timestamp`, optional `attributes`). Blank lines
//! and lines starting with `#` are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tracefilter::config::{TeardownPolicy, TrackingProfile};
use tracefilter::filter::{Admission, RuleKind};
use tracefilter::sample::codec;
use tracefilter::store::{MemorySessionStore, SessionStore};
use tracefilter::tracker::{StopReport, Tracker, TrackerSettings};
use tracing::warn;

use super::common::{database_path, format_distance, format_elapsed, load_config, open_database};
use crate::error::CliError;

/// Replay arguments.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON Lines file with one sample per line
    #[arg(long)]
    pub input: PathBuf,

    /// Store the track in this database
    #[arg(long, conflicts_with = "persist")]
    pub db: Option<PathBuf>,

    /// Store the track in the configured database (otherwise it is kept in memory)
    #[arg(long)]
    pub persist: bool,

    /// Tracking profile JSON overriding the [location] and [activity] settings
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Keep every sample, bypassing the outlier filter
    #[arg(long)]
    pub no_filter: bool,

    /// Commit samples still buffered when the replay ends
    #[arg(long)]
    pub flush: bool,

    /// Record under this (remote) session id, marking the track as valid
    #[arg(long)]
    pub session: Option<String>,

    /// Fail on the first malformed line instead of skipping it
    #[arg(long)]
    pub strict: bool,
}

/// Per-outcome counts for a replay.
#[derive(Debug, Default, PartialEq)]
pub struct ReplayTally {
    pub lines: usize,
    pub malformed: usize,
    pub bypassed: usize,
    pub buffered: usize,
    pub committed: usize,
    pub evicted: usize,
    pub rejected: BTreeMap<RuleKind, usize>,
}

impl ReplayTally {
    pub fn record(&mut self, admission: Admission) {
        match admission {
            Admission::Bypassed => self.bypassed += 1,
            Admission::Rejected(kind) => *self.rejected.entry(kind).or_default() += 1,
            Admission::Buffered { .. } => self.buffered += 1,
            Admission::Committed { .. } => self.committed += 1,
        }
        if admission.evicted() {
            self.evicted += 1;
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let config = load_config();

    let mut settings = TrackerSettings::from_config(&config);
    if let Some(path) = &args.profile {
        settings.profile = read_profile(path)?;
    }
    if args.no_filter {
        settings.profile.outlier_removal_enabled = false;
    }
    if args.flush {
        settings.teardown = TeardownPolicy::Flush;
    }

    let store: Arc<dyn SessionStore> = if args.db.is_some() || args.persist {
        let path = database_path(args.db.clone(), &config);
        println!("Database: {}", path.display());
        Arc::new(open_database(&path)?)
    } else {
        Arc::new(MemorySessionStore::new())
    };

    let tracker = Tracker::new(store, settings);
    let session_id = match &args.session {
        Some(id) => {
            tracker.start_session_with_id(id, true)?;
            id.clone()
        }
        None => tracker.start_session(false)?,
    };

    let file = fs::File::open(&args.input).map_err(|error| CliError::FileRead {
        path: args.input.clone(),
        error,
    })?;

    let mut tally = ReplayTally::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|error| CliError::FileRead {
            path: args.input.clone(),
            error,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        tally.lines += 1;

        let sample = match codec::from_json_str(trimmed) {
            Ok(sample) => sample,
            Err(error) if args.strict => {
                return Err(CliError::Parse {
                    line: index + 1,
                    error,
                })
            }
            Err(error) => {
                warn!(line = index + 1, %error, "Skipping malformed sample");
                tally.malformed += 1;
                continue;
            }
        };

        tally.record(tracker.ingest(&session_id, sample)?);
    }

    let report = tracker.stop_session(&session_id)?;
    print_report(&tally, &report);
    Ok(())
}

fn read_profile(path: &Path) -> Result<TrackingProfile, CliError> {
    let content = fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;
    TrackingProfile::from_json_str(&content)
        .map_err(|e| CliError::Config(format!("Invalid profile '{}': {}", path.display(), e)))
}

fn print_report(tally: &ReplayTally, report: &StopReport) {
    println!("Session {}", report.session_id);
    println!("  Samples read:     {}", tally.lines);
    if tally.malformed > 0 {
        println!("  Malformed:        {}", tally.malformed);
    }
    if tally.bypassed > 0 {
        println!("  Unfiltered:       {}", tally.bypassed);
    }
    println!("  Rejected:         {}", tally.rejected_total());
    for (kind, count) in &tally.rejected {
        println!("    {:<18} {}", kind, count);
    }
    println!("  Evicted:          {}", tally.evicted);
    if report.flushed > 0 {
        println!("  Flushed on stop:  {}", report.flushed);
    }
    if report.dropped > 0 {
        println!("  Dropped on stop:  {}", report.dropped);
    }
    println!();
    println!("  Committed:        {}", report.samples);
    println!("  Distance:         {}", format_distance(report.distance_m));
    println!("  Elapsed:          {}", format_elapsed(report.elapsed_time_ms));
    if let Some(stats) = &report.speed_stats {
        println!("  Speed:            {}", stats);
    }
    if !report.retained {
        println!();
        println!("Track too short to keep; it was discarded.");
    }
}
