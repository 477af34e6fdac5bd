//! Track persistence.
//!
//! The `SessionStore` trait is the seam between the filtering pipeline and
//! wherever tracks end up. Two backends are provided:
//!
//! - [`MemorySessionStore`]: rows kept in process memory, for tests and
//!   short-lived replays.
//! - [`SqliteSessionStore`]: a SQLite database with a `tracks` table and a
//!   `traces` table; deleting a track cascades to its samples.
//!
//! # Sessions
//!
//! Each track belongs to one session id. Session ids handed out by
//! [`SessionStore::next_session_id`] are numeric strings derived from the
//! store's own row ids, so local ids never collide with each other. A
//! session renamed to a remote id is marked valid.
//!
//! A closed session accepts no further samples.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use thiserror::Error;

use crate::sample::codec::CodecError;
use crate::sample::LocationSample;
use crate::track::{Track, TrackSummary};

/// Errors raised by session stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored sample could not be decoded.
    #[error("Corrupt sample row: {0}")]
    Codec(#[from] CodecError),

    /// The session was closed and accepts no further samples.
    #[error("Session {0} is closed")]
    SessionClosed(String),

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Persistence interface for tracks.
///
/// All operations address tracks by session id. Implementations must be
/// `Send + Sync`: the committer calls them from whatever thread delivers
/// samples.
pub trait SessionStore: Send + Sync {
    /// Create the session row. No-op if the session already exists.
    fn create_session(&self, session_id: &str, is_valid: bool) -> Result<(), StorageError>;

    /// Append a sample, creating the session if needed.
    ///
    /// # Errors
    ///
    /// [`StorageError::SessionClosed`] if the session was closed.
    fn append_sample(
        &self,
        session_id: &str,
        is_valid: bool,
        sample: &LocationSample,
    ) -> Result<(), StorageError>;

    /// Load a track with its samples in insertion order.
    fn load_track(&self, session_id: &str) -> Result<Option<Track>, StorageError>;

    /// Summaries of all stored tracks, oldest first.
    fn list_summaries(&self) -> Result<Vec<TrackSummary>, StorageError>;

    /// Number of tracks, optionally restricted to closed (`Some(true)`) or
    /// open (`Some(false)`) ones.
    fn count(&self, closed: Option<bool>) -> Result<usize, StorageError>;

    /// The next free local session id: highest row id + 1, or "1" when empty.
    fn next_session_id(&self) -> Result<String, StorageError>;

    /// Rename a session and mark it valid. Returns false if `old` is unknown.
    fn rename_session(&self, old: &str, new: &str) -> Result<bool, StorageError>;

    /// Close a session. Returns false if it is unknown.
    fn close_session(&self, session_id: &str) -> Result<bool, StorageError>;

    /// Record travelled distance (m) and elapsed time (ms).
    fn update_progress(
        &self,
        session_id: &str,
        distance_m: f64,
        elapsed_time_ms: i64,
    ) -> Result<bool, StorageError>;

    /// Delete a session and all its samples. Returns false if it is unknown.
    fn delete_session(&self, session_id: &str) -> Result<bool, StorageError>;

    fn session_exists(&self, session_id: &str) -> Result<bool, StorageError>;
}
