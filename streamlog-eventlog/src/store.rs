//! Event store port and its PostgreSQL adapter.

use crate::append::append_event;
use crate::directory;
use crate::load::{load_events, load_stream};
use crate::types::{AppendOptions, AppendOutcome, NewEvent, RecordedEvent, Result, Stream};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Append and read event streams.
///
/// Implementations hold no per-stream state between calls; all coordination
/// between concurrent appenders happens in the backing store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event, failing with a conflict if `expected_version` is stale.
    async fn append(
        &self,
        stream_id: Uuid,
        stream_type: &str,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<AppendOutcome>;

    /// Payloads of the stream in version order (empty if unknown).
    async fn load(&self, stream_id: Uuid) -> Result<Vec<serde_json::Value>>;

    /// Full events from `from_version` onwards, in version order.
    async fn load_events(&self, stream_id: Uuid, from_version: i64)
        -> Result<Vec<RecordedEvent>>;

    /// Directory row for the stream, if it exists.
    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>>;
}

/// PostgreSQL-backed event store.
///
/// Expects a pool whose database already has the `streams` and `events`
/// tables (see `streamlog-db`).
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    options: AppendOptions,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            options: AppendOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AppendOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn options(&self) -> &AppendOptions {
        &self.options
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        stream_id: Uuid,
        stream_type: &str,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<AppendOutcome> {
        append_event(
            &self.pool,
            stream_id,
            stream_type,
            event,
            expected_version,
            &self.options,
        )
        .await
    }

    async fn load(&self, stream_id: Uuid) -> Result<Vec<serde_json::Value>> {
        load_stream(&self.pool, stream_id).await
    }

    async fn load_events(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<RecordedEvent>> {
        load_events(&self.pool, stream_id, from_version).await
    }

    async fn get_stream(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let mut conn = self.pool.acquire().await?;
        directory::find_stream(&mut conn, stream_id).await
    }
}
