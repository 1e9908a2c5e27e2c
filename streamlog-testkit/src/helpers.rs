//! Append drivers and fixtures shared by the event log tests.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use uuid::Uuid;

use crate::Result;
use streamlog_eventlog::{AppendOutcome, EventStore, NewEvent};

/// Event type used by the fixture events.
pub const TEST_EVENT_TYPE: &str = "TestEventRecorded";

/// How a batch of concurrent appends ended.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppendTally {
    /// Appends that committed
    pub successes: usize,
    /// Appends rejected with a version conflict
    pub conflicts: usize,
    /// Versions reported by the committed appends
    pub committed_versions: Vec<i64>,
}

/// Fresh, time-ordered stream id.
pub fn new_stream_id() -> Uuid {
    Uuid::now_v7()
}

/// Payload carrying its ordinal, so replay order can be checked.
pub fn payload(n: usize) -> serde_json::Value {
    json!({ "n": n })
}

/// Fixture event with [`payload`] as its body.
pub fn test_event(n: usize) -> NewEvent {
    NewEvent::new(TEST_EVENT_TYPE, payload(n))
}

/// Append `count` events one after another, each with the correct expected version.
///
/// Assumes the stream is empty.
pub async fn append_sequential<S>(
    store: &S,
    stream_id: Uuid,
    stream_type: &str,
    count: usize,
) -> Result<Vec<AppendOutcome>>
where
    S: EventStore + ?Sized,
{
    let mut outcomes = Vec::with_capacity(count);
    for n in 0..count {
        let expected_version = n as i64 - 1;
        let outcome = store
            .append(stream_id, stream_type, test_event(n), expected_version)
            .await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Spawn `writers` tasks that all append with the same `expected_version`.
///
/// Conflicts are counted; any other error fails the whole run.
pub async fn append_concurrent<S>(
    store: Arc<S>,
    stream_id: Uuid,
    stream_type: &str,
    writers: usize,
    expected_version: i64,
) -> Result<AppendTally>
where
    S: EventStore + 'static,
{
    let mut handles = Vec::with_capacity(writers);
    for n in 0..writers {
        let store = store.clone();
        let stream_type = stream_type.to_string();
        handles.push(tokio::spawn(async move {
            store
                .append(stream_id, &stream_type, test_event(n), expected_version)
                .await
        }));
    }

    let mut tally = AppendTally::default();
    for handle in handles {
        match handle.await? {
            Ok(outcome) => {
                tally.successes += 1;
                tally.committed_versions.push(outcome.version);
            },
            Err(e) if e.is_conflict() => tally.conflicts += 1,
            Err(e) => return Err(anyhow!("concurrent append failed: {}", e)),
        }
    }

    tally.committed_versions.sort_unstable();
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamlog_eventlog::MemoryEventStore;

    #[tokio::test]
    async fn test_append_sequential_versions() {
        let store = MemoryEventStore::new();
        let stream_id = new_stream_id();

        let outcomes = append_sequential(&store, stream_id, "counter", 3).await.unwrap();
        let versions: Vec<i64> = outcomes.iter().map(|o| o.version).collect();

        assert_eq!(versions, vec![0, 1, 2]);
        assert!(outcomes[0].created_stream);
        assert!(!outcomes[1].created_stream);
    }

    #[tokio::test]
    async fn test_append_concurrent_tallies_conflicts() {
        let store = Arc::new(MemoryEventStore::new());
        let stream_id = new_stream_id();

        let tally = append_concurrent(store, stream_id, "counter", 10, -1).await.unwrap();

        assert_eq!(tally.successes, 1);
        assert_eq!(tally.conflicts, 9);
        assert_eq!(tally.committed_versions, vec![0]);
    }

    #[test]
    fn test_payload_carries_ordinal() {
        assert_eq!(payload(7), json!({"n": 7}));
        assert_eq!(test_event(7).event_type, TEST_EVENT_TYPE);
    }
}
