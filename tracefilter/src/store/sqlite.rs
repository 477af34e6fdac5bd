//! SQLite session store.
//!
//! Schema:
//!
//! - `tracks`: one row per session with its flags and progress counters.
//! - `traces`: one row per committed sample. Main attributes are columns,
//!   the secondary attributes are stored as a JSON string. Rows cascade on
//!   track deletion.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{SessionStore, StorageError};
use crate::sample::codec;
use crate::sample::LocationSample;
use crate::track::{Track, TrackSummary};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session TEXT NOT NULL UNIQUE,
        is_valid INTEGER NOT NULL DEFAULT 0,
        is_closed INTEGER NOT NULL DEFAULT 0,
        elapsed_time INTEGER NOT NULL DEFAULT 0,
        elapsed_distance REAL NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS traces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        timestamp INTEGER NOT NULL,
        attributes TEXT NOT NULL,
        track_id INTEGER NOT NULL,
        FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_traces_track ON traces(track_id);

    PRAGMA foreign_keys = ON;
"#;

/// Session store backed by a SQLite database.
///
/// The connection is serialized behind a mutex; every operation holds it
/// for one statement or one transaction.
pub struct SqliteSessionStore {
    db: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        info!(path = %path.display(), "Track database opened");
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Row id and closed flag of a session.
    fn lookup(conn: &Connection, session_id: &str) -> Result<Option<(i64, bool)>, StorageError> {
        let row = conn
            .query_row(
                "SELECT id, is_closed FROM tracks WHERE session = ?1",
                params![session_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        Ok(row)
    }
}

impl std::fmt::Debug for SqliteSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSessionStore").finish_non_exhaustive()
    }
}

impl SessionStore for SqliteSessionStore {
    fn create_session(&self, session_id: &str, is_valid: bool) -> Result<(), StorageError> {
        let conn = self.db.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tracks (session, is_valid) VALUES (?1, ?2)",
            params![session_id, is_valid],
        )?;
        if inserted > 0 {
            debug!(session = %session_id, is_valid, "Track created");
        }
        Ok(())
    }

    fn append_sample(
        &self,
        session_id: &str,
        is_valid: bool,
        sample: &LocationSample,
    ) -> Result<(), StorageError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let track_id = match Self::lookup(&tx, session_id)? {
            Some((_, true)) => return Err(StorageError::SessionClosed(session_id.to_string())),
            Some((id, false)) => id,
            None => {
                tx.execute(
                    "INSERT INTO tracks (session, is_valid) VALUES (?1, ?2)",
                    params![session_id, is_valid],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.execute(
            "INSERT INTO traces (latitude, longitude, timestamp, attributes, track_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.latitude,
                sample.longitude,
                sample.timestamp_ms,
                codec::encode_attributes(sample),
                track_id
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load_track(&self, session_id: &str) -> Result<Option<Track>, StorageError> {
        let conn = self.db.lock();

        let header = conn
            .query_row(
                "SELECT id, is_valid, is_closed, elapsed_distance FROM tracks WHERE session = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((track_id, is_valid, is_closed, distance_m)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT latitude, longitude, timestamp, attributes FROM traces
             WHERE track_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![track_id], |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let samples = rows
            .iter()
            .map(|(lat, lon, ts, attributes)| codec::decode_sample(*lat, *lon, *ts, attributes))
            .collect::<Result<Vec<_>, _>>()?;

        let mut track = Track::new(session_id);
        track.samples = samples;
        track.is_valid = is_valid;
        track.is_closed = is_closed;
        track.distance_m = distance_m;
        Ok(Some(track))
    }

    fn list_summaries(&self) -> Result<Vec<TrackSummary>, StorageError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT session, is_closed, is_valid, elapsed_distance, elapsed_time
             FROM tracks ORDER BY id",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(TrackSummary {
                    session_id: row.get(0)?,
                    is_closed: row.get(1)?,
                    is_valid: row.get(2)?,
                    distance_m: row.get(3)?,
                    elapsed_time_ms: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    fn count(&self, closed: Option<bool>) -> Result<usize, StorageError> {
        let conn = self.db.lock();
        let count: i64 = match closed {
            None => conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?,
            Some(closed) => conn.query_row(
                "SELECT COUNT(*) FROM tracks WHERE is_closed = ?1",
                params![closed],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }

    fn next_session_id(&self) -> Result<String, StorageError> {
        let conn = self.db.lock();
        let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM tracks", [], |row| row.get(0))?;
        Ok((max.unwrap_or(0) + 1).to_string())
    }

    fn rename_session(&self, old: &str, new: &str) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE tracks SET session = ?2, is_valid = 1 WHERE session = ?1",
            params![old, new],
        )?;
        Ok(changed > 0)
    }

    fn close_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE tracks SET is_closed = 1 WHERE session = ?1",
            params![session_id],
        )?;
        Ok(changed > 0)
    }

    fn update_progress(
        &self,
        session_id: &str,
        distance_m: f64,
        elapsed_time_ms: i64,
    ) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE tracks SET elapsed_distance = ?2, elapsed_time = ?3 WHERE session = ?1",
            params![session_id, distance_m, elapsed_time_ms],
        )?;
        Ok(changed > 0)
    }

    fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        let deleted = conn.execute("DELETE FROM tracks WHERE session = ?1", params![session_id])?;
        if deleted > 0 {
            debug!(session = %session_id, "Track deleted");
        }
        Ok(deleted > 0)
    }

    fn session_exists(&self, session_id: &str) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        Ok(Self::lookup(&conn, session_id)?.is_some())
    }
}
