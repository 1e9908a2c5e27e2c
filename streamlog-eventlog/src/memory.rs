//! In-memory event store
//!
//! Used for testing and development without a database. The write lock
//! plays the part of the store's row locks: the version check and the
//! append happen under it, so conflict behaviour matches `PgEventStore`.

use crate::append::validate_append;
use crate::store::EventStore;
use crate::types::{
    AppendOutcome, EventLogError, NewEvent, RecordedEvent, Result, Stream, INITIAL_STREAM_VERSION,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct MemoryStream {
    stream_type: String,
    events: Vec<RecordedEvent>,
}

impl MemoryStream {
    fn version(&self) -> i64 {
        self.events.len() as i64 - 1
    }
}

/// In-memory store for testing
#[derive(Default)]
pub struct MemoryEventStore {
    streams: RwLock<HashMap<Uuid, MemoryStream>>,
}

impl MemoryEventStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Number of events across all streams
    pub async fn event_count(&self) -> usize {
        self.streams
            .read()
            .await
            .values()
            .map(|s| s.events.len())
            .sum()
    }

    /// Clear all data (useful for test setup)
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(
        &self,
        stream_id: Uuid,
        stream_type: &str,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<AppendOutcome> {
        validate_append(stream_type, &event, expected_version)?;

        let mut streams = self.streams.write().await;

        // An absent stream sits at -1; it is only materialized if the append wins
        let current = streams
            .get(&stream_id)
            .map(MemoryStream::version)
            .unwrap_or(INITIAL_STREAM_VERSION);

        if current != expected_version {
            warn!(
                stream_id = %stream_id,
                expected_version,
                actual_version = current,
                "Append rejected: stream is no longer at expected version"
            );
            return Err(EventLogError::Conflict {
                stream_id,
                expected: expected_version,
            });
        }

        let created_stream = !streams.contains_key(&stream_id);
        if created_stream {
            info!(stream_id = %stream_id, stream_type = %stream_type, "Stream created");
        }
        let stream = streams.entry(stream_id).or_insert_with(|| MemoryStream {
            stream_type: stream_type.to_string(),
            events: Vec::new(),
        });

        let event_id = Uuid::now_v7();
        let version = expected_version + 1;
        stream.events.push(RecordedEvent {
            id: event_id,
            stream_id,
            version,
            event_type: event.event_type,
            payload: event.payload,
            created_at: Utc::now(),
        });

        debug!(event_id = %event_id, stream_id = %stream_id, version, "Event appended");

        Ok(AppendOutcome {
            event_id,
            stream_id,
            version,
            created_stream,
        })
    }

    async fn load(&self, stream_id: Uuid) -> Result<Vec<serde_json::Value>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&stream_id)
            .map(|s| s.events.iter().map(|e| e.payload.clone()).collect())
            .unwrap_or_default())
    }

    async fn load_events(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<RecordedEvent>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&stream_id)
            .map(|s| {
                s.events
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let streams = self.streams.read().await;
        Ok(streams.get(&stream_id).map(|s| Stream {
            id: stream_id,
            stream_type: s.stream_type.clone(),
            version: s.version(),
        }))
    }
}
