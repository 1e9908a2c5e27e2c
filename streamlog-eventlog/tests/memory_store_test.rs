//! Append/load properties exercised against the in-memory store.
//!
//! These run without a database; `postgres_append_test.rs` repeats the
//! interesting ones against PostgreSQL.

use std::sync::Arc;

use serde_json::json;
use streamlog_eventlog::{EventStore, MemoryEventStore, NewEvent};
use streamlog_testkit::{append_concurrent, append_sequential, new_stream_id, payload};

#[tokio::test]
async fn test_fresh_stream_single_append() {
    let store = MemoryEventStore::new();
    let stream_id = new_stream_id();

    let outcome = store
        .append(stream_id, "invoice", NewEvent::new("InvoiceIssued", json!({"key": "value"})), -1)
        .await
        .expect("append to fresh stream");

    assert_eq!(outcome.version, 0);
    assert_eq!(
        store.get_stream(stream_id).await.unwrap().map(|s| s.version),
        Some(0)
    );
    assert_eq!(store.load(stream_id).await.unwrap(), vec![json!({"key": "value"})]);
}

#[tokio::test]
async fn test_thousand_sequential_appends_replay_in_order() {
    let store = MemoryEventStore::new();
    let stream_id = new_stream_id();

    append_sequential(&store, stream_id, "counter", 1000)
        .await
        .expect("sequential appends");

    let stream = store.get_stream(stream_id).await.unwrap().unwrap();
    assert_eq!(stream.version, 999);

    let payloads = store.load(stream_id).await.unwrap();
    let expected: Vec<_> = (0..1000).map(payload).collect();
    assert_eq!(payloads, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thousand_concurrent_creators_single_winner() {
    let store = Arc::new(MemoryEventStore::new());
    let stream_id = new_stream_id();

    let tally = append_concurrent(store.clone(), stream_id, "counter", 1000, -1)
        .await
        .expect("concurrent appends");

    assert_eq!(tally.successes, 1);
    assert_eq!(tally.conflicts, 999);
    assert_eq!(store.get_stream(stream_id).await.unwrap().unwrap().version, 0);
    assert_eq!(store.load(stream_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appenders_on_existing_stream() {
    let store = Arc::new(MemoryEventStore::new());
    let stream_id = new_stream_id();
    append_sequential(store.as_ref(), stream_id, "counter", 5).await.unwrap();

    let tally = append_concurrent(store.clone(), stream_id, "counter", 20, 4)
        .await
        .unwrap();

    assert_eq!(tally.successes, 1);
    assert_eq!(tally.conflicts, 19);
    assert_eq!(tally.committed_versions, vec![5]);

    let versions: Vec<i64> = store
        .load_events(stream_id, 0)
        .await
        .unwrap()
        .iter()
        .map(|e| e.version)
        .collect();
    assert_eq!(versions, (0..=5).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_stale_version_after_success_conflicts() {
    let store = MemoryEventStore::new();
    let stream_id = new_stream_id();
    append_sequential(&store, stream_id, "counter", 3).await.unwrap();

    // Not idempotent: replaying the last successful call fails
    let err = store
        .append(stream_id, "counter", NewEvent::new("Replay", json!({})), 1)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Ahead of the stream is just as stale
    let err = store
        .append(stream_id, "counter", NewEvent::new("Ahead", json!({})), 7)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    assert_eq!(store.load(stream_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_load_unknown_stream_is_empty() {
    let store = MemoryEventStore::new();

    let payloads = store.load(new_stream_id()).await.expect("load never fails on absence");

    assert!(payloads.is_empty());
}
