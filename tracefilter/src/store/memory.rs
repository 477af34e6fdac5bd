//! In-memory session store.

use parking_lot::RwLock;

use super::{SessionStore, StorageError};
use crate::sample::LocationSample;
use crate::track::{Track, TrackSummary};

#[derive(Debug)]
struct TrackRow {
    id: u64,
    track: Track,
    elapsed_time_ms: i64,
}

#[derive(Debug, Default)]
struct Rows {
    tracks: Vec<TrackRow>,
    last_id: u64,
}

impl Rows {
    fn find(&self, session_id: &str) -> Option<&TrackRow> {
        self.tracks.iter().find(|row| row.track.session_id == session_id)
    }

    fn find_mut(&mut self, session_id: &str) -> Option<&mut TrackRow> {
        self.tracks
            .iter_mut()
            .find(|row| row.track.session_id == session_id)
    }

    fn position(&self, session_id: &str) -> Option<usize> {
        self.tracks
            .iter()
            .position(|row| row.track.session_id == session_id)
    }

    /// Insert a new row and return its index.
    fn insert(&mut self, session_id: &str, is_valid: bool) -> usize {
        self.last_id += 1;
        let mut track = Track::new(session_id);
        track.is_valid = is_valid;
        self.tracks.push(TrackRow {
            id: self.last_id,
            track,
            elapsed_time_ms: 0,
        });
        self.tracks.len() - 1
    }
}

/// Session store keeping all rows in memory.
///
/// Row ids auto-increment and are never reused while the store lives,
/// matching SQLite's AUTOINCREMENT.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    rows: RwLock<Rows>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn create_session(&self, session_id: &str, is_valid: bool) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        if rows.find(session_id).is_none() {
            rows.insert(session_id, is_valid);
        }
        Ok(())
    }

    fn append_sample(
        &self,
        session_id: &str,
        is_valid: bool,
        sample: &LocationSample,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.write();
        let index = match rows.position(session_id) {
            Some(index) => index,
            None => rows.insert(session_id, is_valid),
        };
        let row = &mut rows.tracks[index];

        if row.track.is_closed {
            return Err(StorageError::SessionClosed(session_id.to_string()));
        }

        row.track.samples.push(sample.clone());
        Ok(())
    }

    fn load_track(&self, session_id: &str) -> Result<Option<Track>, StorageError> {
        Ok(self.rows.read().find(session_id).map(|row| row.track.clone()))
    }

    fn list_summaries(&self) -> Result<Vec<TrackSummary>, StorageError> {
        Ok(self
            .rows
            .read()
            .tracks
            .iter()
            .map(|row| TrackSummary {
                session_id: row.track.session_id.clone(),
                is_closed: row.track.is_closed,
                is_valid: row.track.is_valid,
                distance_m: row.track.distance_m,
                elapsed_time_ms: row.elapsed_time_ms,
            })
            .collect())
    }

    fn count(&self, closed: Option<bool>) -> Result<usize, StorageError> {
        let rows = self.rows.read();
        Ok(match closed {
            None => rows.tracks.len(),
            Some(closed) => rows
                .tracks
                .iter()
                .filter(|row| row.track.is_closed == closed)
                .count(),
        })
    }

    fn next_session_id(&self) -> Result<String, StorageError> {
        let rows = self.rows.read();
        let max = rows.tracks.iter().map(|row| row.id).max().unwrap_or(0);
        Ok((max + 1).to_string())
    }

    fn rename_session(&self, old: &str, new: &str) -> Result<bool, StorageError> {
        let mut rows = self.rows.write();
        match rows.find_mut(old) {
            Some(row) => {
                row.track.session_id = new.to_string();
                row.track.is_valid = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut rows = self.rows.write();
        match rows.find_mut(session_id) {
            Some(row) => {
                row.track.is_closed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_progress(
        &self,
        session_id: &str,
        distance_m: f64,
        elapsed_time_ms: i64,
    ) -> Result<bool, StorageError> {
        let mut rows = self.rows.write();
        match rows.find_mut(session_id) {
            Some(row) => {
                row.track.distance_m = distance_m;
                row.elapsed_time_ms = elapsed_time_ms;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut rows = self.rows.write();
        let before = rows.tracks.len();
        rows.tracks.retain(|row| row.track.session_id != session_id);
        Ok(rows.tracks.len() != before)
    }

    fn session_exists(&self, session_id: &str) -> Result<bool, StorageError> {
        Ok(self.rows.read().find(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: i64) -> LocationSample {
        LocationSample::new(38.7, -9.1).at_millis(ms)
    }

    #[test]
    fn test_next_session_id() {
        let store = MemorySessionStore::new();
        assert_eq!(store.next_session_id().unwrap(), "1");

        store.create_session("1", false).unwrap();
        store.create_session("remote-abc", true).unwrap();
        assert_eq!(store.next_session_id().unwrap(), "3");
    }

    #[test]
    fn test_row_ids_are_not_reused() {
        let store = MemorySessionStore::new();
        store.create_session("1", false).unwrap();
        store.create_session("2", false).unwrap();
        store.delete_session("2").unwrap();

        // Highest live row id is 1
        assert_eq!(store.next_session_id().unwrap(), "2");

        store.create_session("2", false).unwrap();
        assert_eq!(store.next_session_id().unwrap(), "4");
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = MemorySessionStore::new();
        store.create_session("1", false).unwrap();
        store.create_session("1", true).unwrap();

        assert_eq!(store.count(None).unwrap(), 1);
        assert!(!store.load_track("1").unwrap().unwrap().is_valid);
    }

    #[test]
    fn test_append_creates_session() {
        let store = MemorySessionStore::new();
        store.append_sample("9", true, &sample(0)).unwrap();
        store.append_sample("9", true, &sample(1000)).unwrap();

        let track = store.load_track("9").unwrap().unwrap();
        assert_eq!(track.samples, vec![sample(0), sample(1000)]);
        assert!(track.is_valid);
    }

    #[test]
    fn test_closed_session_rejects_appends() {
        let store = MemorySessionStore::new();
        store.append_sample("1", false, &sample(0)).unwrap();
        assert!(store.close_session("1").unwrap());

        let err = store.append_sample("1", false, &sample(1)).unwrap_err();
        assert!(matches!(err, StorageError::SessionClosed(id) if id == "1"));
        assert_eq!(store.count(Some(true)).unwrap(), 1);
        assert_eq!(store.count(Some(false)).unwrap(), 0);
    }

    #[test]
    fn test_rename_marks_valid() {
        let store = MemorySessionStore::new();
        store.create_session("1", false).unwrap();

        assert!(store.rename_session("1", "srv-77").unwrap());
        assert!(!store.session_exists("1").unwrap());
        assert!(store.load_track("srv-77").unwrap().unwrap().is_valid);
        assert!(!store.rename_session("missing", "x").unwrap());
    }

    #[test]
    fn test_progress_and_summaries() {
        let store = MemorySessionStore::new();
        store.create_session("1", false).unwrap();
        assert!(store.update_progress("1", 120.5, 30_000).unwrap());
        assert!(!store.update_progress("2", 1.0, 1).unwrap());

        let summaries = store.list_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].distance_m, 120.5);
        assert_eq!(summaries[0].elapsed_time_ms, 30_000);
    }

    #[test]
    fn test_delete() {
        let store = MemorySessionStore::new();
        store.append_sample("1", false, &sample(0)).unwrap();

        assert!(store.delete_session("1").unwrap());
        assert!(!store.delete_session("1").unwrap());
        assert!(store.load_track("1").unwrap().is_none());
    }
}
