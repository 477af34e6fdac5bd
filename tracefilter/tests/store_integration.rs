//! Integration tests for the session stores.
//!
//! Both backends run through the same scenarios, so behavior observed by the
//! tracker does not depend on where tracks are kept.
//!
//! Run with: `cargo test --test store_integration`

use serde_json::json;
use tempfile::TempDir;

use tracefilter::activity::ActivityKind;
use tracefilter::sample::{ActivityTag, LocationSample};
use tracefilter::store::{MemorySessionStore, SessionStore, SqliteSessionStore, StorageError};

// ============================================================================
// Helper Functions
// ============================================================================

fn sample(ms: i64) -> LocationSample {
    LocationSample::new(38.736946 + ms as f64 * 1e-8, -9.142685)
        .with_accuracy(4.5)
        .with_speed(1.25)
        .with_provider("fused")
        .at_millis(ms)
}

/// Run `scenario` against a fresh memory store and a fresh file database.
fn for_each_backend(scenario: impl Fn(&dyn SessionStore)) {
    let memory = MemorySessionStore::new();
    scenario(&memory);

    let dir = TempDir::new().unwrap();
    let sqlite = SqliteSessionStore::open(dir.path().join("tracks.db")).unwrap();
    scenario(&sqlite);
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_session_lifecycle() {
    for_each_backend(|store| {
        assert_eq!(store.next_session_id().unwrap(), "1");

        store.create_session("1", false).unwrap();
        // Creating twice is a no-op
        store.create_session("1", true).unwrap();
        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(store.next_session_id().unwrap(), "2");

        for ms in [0, 1000, 2000] {
            store.append_sample("1", false, &sample(ms)).unwrap();
        }
        assert!(store.update_progress("1", 12.5, 2000).unwrap());
        assert_eq!(store.count(Some(false)).unwrap(), 1);

        assert!(store.close_session("1").unwrap());
        assert_eq!(store.count(Some(true)).unwrap(), 1);
        assert_eq!(store.count(Some(false)).unwrap(), 0);

        let track = store.load_track("1").unwrap().unwrap();
        assert!(track.is_closed);
        assert!(!track.is_valid);
        assert_eq!(track.distance_m, 12.5);
        assert_eq!(
            track.samples.iter().map(|s| s.timestamp_ms).collect::<Vec<_>>(),
            vec![0, 1000, 2000]
        );
    });
}

#[test]
fn test_closed_session_rejects_samples() {
    for_each_backend(|store| {
        store.append_sample("7", false, &sample(0)).unwrap();
        store.close_session("7").unwrap();

        let err = store.append_sample("7", false, &sample(1000)).unwrap_err();
        assert!(matches!(err, StorageError::SessionClosed(ref id) if id == "7"));
        assert_eq!(store.load_track("7").unwrap().unwrap().len(), 1);
    });
}

#[test]
fn test_append_creates_missing_session() {
    for_each_backend(|store| {
        assert!(!store.session_exists("remote-42").unwrap());
        store.append_sample("remote-42", true, &sample(0)).unwrap();

        assert!(store.session_exists("remote-42").unwrap());
        let summary = &store.list_summaries().unwrap()[0];
        assert_eq!(summary.session_id, "remote-42");
        assert!(summary.is_valid);
        assert!(!summary.is_closed);
    });
}

#[test]
fn test_rename_marks_valid() {
    for_each_backend(|store| {
        store.create_session("1", false).unwrap();
        store.append_sample("1", false, &sample(0)).unwrap();

        assert!(store.rename_session("1", "server-9").unwrap());
        assert!(!store.rename_session("1", "other").unwrap());

        assert!(!store.session_exists("1").unwrap());
        let track = store.load_track("server-9").unwrap().unwrap();
        assert!(track.is_valid);
        assert_eq!(track.len(), 1);
    });
}

#[test]
fn test_delete_removes_samples() {
    for_each_backend(|store| {
        store.append_sample("1", false, &sample(0)).unwrap();
        store.append_sample("2", false, &sample(0)).unwrap();

        assert!(store.delete_session("1").unwrap());
        assert!(!store.delete_session("1").unwrap());
        assert!(store.load_track("1").unwrap().is_none());

        // Ids are never reused after a delete
        assert_eq!(store.next_session_id().unwrap(), "3");
        assert_eq!(store.load_track("2").unwrap().unwrap().len(), 1);
    });
}

#[test]
fn test_unknown_sessions() {
    for_each_backend(|store| {
        assert!(store.load_track("nope").unwrap().is_none());
        assert!(!store.close_session("nope").unwrap());
        assert!(!store.update_progress("nope", 1.0, 1).unwrap());
        assert!(store.list_summaries().unwrap().is_empty());
    });
}

#[test]
fn test_sample_fields_survive_storage() {
    for_each_backend(|store| {
        let original = sample(5000)
            .with_altitude(87.0)
            .with_bearing(271.5)
            .with_activity(ActivityTag::Detected {
                kind: ActivityKind::Running,
                confidence: 80,
            })
            .with_extra("satellites", json!(9));

        store.append_sample("1", false, &original).unwrap();
        let stored = &store.load_track("1").unwrap().unwrap().samples[0];

        assert_eq!(stored, &original);
        assert_eq!(stored.satellites(), Some(9));
    });
}

#[test]
fn test_file_database_persists_across_opens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracks.db");

    {
        let store = SqliteSessionStore::open(&path).unwrap();
        store.append_sample("1", false, &sample(0)).unwrap();
        store.append_sample("1", false, &sample(1000)).unwrap();
        store.close_session("1").unwrap();
    }

    let store = SqliteSessionStore::open(&path).unwrap();
    let track = store.load_track("1").unwrap().unwrap();
    assert!(track.is_closed);
    assert_eq!(track.len(), 2);
    assert_eq!(store.next_session_id().unwrap(), "2");
}
