//! Tests for session types, persistence backends and the store.

use std::time::Duration;

use super::sqlite::open_memory;
use super::{MemorySessionDb, SessionPersistence, SessionStore, SqliteSessionDb, UploadSession};
use crate::error::UploadError;
use crate::testing::FailingSessionDb;

fn session(id: &str, file_size: u64) -> UploadSession {
    UploadSession::new(
        id.to_string(),
        "meeting.webm".to_string(),
        file_size,
        "video/webm".to_string(),
        100,
        "fp-1".to_string(),
        Some(vec!["h0".into(), "h1".into(), "h2".into()]),
    )
}

#[test]
fn new_session_counts_chunks() {
    let s = session("a", 250);
    assert_eq!(s.total_chunks, 3);
    assert!(s.uploaded_chunks.is_empty());
    assert_eq!(s.remaining_chunks(), vec![0, 1, 2]);
    assert!(!s.is_complete());
}

#[test]
fn record_uploaded_is_idempotent_and_bounded() {
    let mut s = session("a", 250);
    assert!(s.record_uploaded(1));
    assert!(!s.record_uploaded(1));
    assert!(!s.record_uploaded(3));
    assert_eq!(s.uploaded_chunks.len(), 1);
    assert_eq!(s.remaining_chunks(), vec![0, 2]);
}

#[test]
fn json_uses_camel_case_and_explicit_chunk_array() {
    let mut s = session("a", 250);
    s.record_uploaded(2);
    s.record_uploaded(0);
    let json: serde_json::Value = serde_json::to_value(&s).unwrap();
    assert_eq!(json["sessionId"], "a");
    assert_eq!(json["fileFingerprint"], "fp-1");
    assert_eq!(json["totalChunks"], 3);
    assert_eq!(json["uploadedChunks"], serde_json::json!([0, 2]));
    assert_eq!(json["chunkHashes"][1], "h1");

    let back: UploadSession = serde_json::from_value(json).unwrap();
    assert_eq!(back, s);
}

#[test]
fn json_without_chunk_hashes_omits_the_key() {
    let mut s = session("a", 250);
    s.chunk_hashes = None;
    let json = serde_json::to_string(&s).unwrap();
    assert!(!json.contains("chunkHashes"));
}

#[tokio::test]
async fn sqlite_set_get_list_delete() {
    let db = open_memory().await.unwrap();
    assert!(db.list().await.unwrap().is_empty());
    assert!(db.get("missing").await.unwrap().is_none());

    let mut a = session("a", 250);
    a.created_at = 1_000;
    let mut b = session("b", 500);
    b.created_at = 2_000;
    db.set(&a).await.unwrap();
    db.set(&b).await.unwrap();

    let all = db.list().await.unwrap();
    assert_eq!(all.len(), 2);
    // Newest first
    assert_eq!(all[0].session_id, "b");
    assert_eq!(all[1].session_id, "a");

    a.record_uploaded(1);
    db.set(&a).await.unwrap();
    let loaded = db.get("a").await.unwrap().expect("session exists");
    assert_eq!(loaded.uploaded_chunks.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(loaded, a);

    db.delete("a").await.unwrap();
    db.delete("a").await.unwrap();
    assert!(db.get("a").await.unwrap().is_none());
    assert_eq!(db.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("sessions.db");

    let mut s = session("persisted", 250);
    s.record_uploaded(0);
    {
        let db = SqliteSessionDb::open_at(&path).await.unwrap();
        db.set(&s).await.unwrap();
        db.close().await;
    }

    let db = SqliteSessionDb::open_at(&path).await.unwrap();
    let loaded = db.get("persisted").await.unwrap().expect("session survives reopen");
    assert_eq!(loaded, s);
}

#[tokio::test]
async fn store_create_rejects_duplicate_ids() {
    let store = SessionStore::new(MemorySessionDb::new());
    let s = session("dup", 100);
    store.create(&s).await.unwrap();
    assert!(store.create(&s).await.is_err());
}

#[tokio::test]
async fn store_mark_chunk_uploaded_persists_and_touches() {
    let store = SessionStore::new(MemorySessionDb::new());
    let mut s = session("m", 250);
    s.last_activity = 0;
    store.create(&s).await.unwrap();

    assert!(store.mark_chunk_uploaded(&mut s, 2).await.unwrap());
    assert!(!store.mark_chunk_uploaded(&mut s, 2).await.unwrap());
    assert!(s.last_activity > 0);

    let loaded = store.load("m").await.unwrap().unwrap();
    assert!(loaded.is_uploaded(2));
    assert_eq!(loaded.uploaded_chunks.len(), 1);
}

#[tokio::test]
async fn failed_chunk_write_leaves_session_unchanged() {
    let db = FailingSessionDb::new();
    db.fail_set(3);
    let store = SessionStore::new(db);
    let mut s = session("w", 250);
    s.last_activity = 0;
    store.create(&s).await.unwrap();

    assert!(store.mark_chunk_uploaded(&mut s, 0).await.unwrap());
    let before = s.clone();
    assert!(store.mark_chunk_uploaded(&mut s, 1).await.is_err());
    assert_eq!(s, before);
    assert!(!s.is_uploaded(1));

    let stored = store.load("w").await.unwrap().unwrap();
    assert_eq!(stored.uploaded_chunks, s.uploaded_chunks);

    // The next write goes through and records the chunk.
    assert!(store.mark_chunk_uploaded(&mut s, 1).await.unwrap());
    assert!(store.load("w").await.unwrap().unwrap().is_uploaded(1));
}

#[tokio::test]
async fn cleanup_removes_only_expired_sessions() {
    let store = SessionStore::with_retention(MemorySessionDb::new(), Duration::from_secs(60));
    let now = 10_000_000;

    let mut fresh = session("fresh", 100);
    fresh.last_activity = now - 30_000;
    let mut stale = session("stale", 100);
    stale.last_activity = now - 61_000;
    store.backend().set(&fresh).await.unwrap();
    store.backend().set(&stale).await.unwrap();

    let removed = store.cleanup_expired_at(now).await.unwrap();
    assert_eq!(removed, vec!["stale".to_string()]);
    assert!(store.load("fresh").await.unwrap().is_some());
    assert!(store.load("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_keeps_leased_sessions() {
    let store = SessionStore::with_retention(MemorySessionDb::new(), Duration::from_secs(60));
    let mut stale = session("busy", 100);
    stale.last_activity = 0;
    store.backend().set(&stale).await.unwrap();

    let lease = store.acquire("busy").unwrap();
    assert!(store.cleanup_expired_at(10_000_000).await.unwrap().is_empty());
    drop(lease);
    assert_eq!(store.cleanup_expired_at(10_000_000).await.unwrap(), vec!["busy".to_string()]);
}

#[test]
fn lease_is_exclusive_until_dropped() {
    let store = SessionStore::new(MemorySessionDb::new());
    let lease = store.acquire("s").unwrap();
    assert_eq!(lease.session_id(), "s");
    assert!(matches!(store.acquire("s"), Err(UploadError::SessionBusy(id)) if id == "s"));
    assert!(store.acquire("other").is_ok());
    drop(lease);
    assert!(store.acquire("s").is_ok());
}
