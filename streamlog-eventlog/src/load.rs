//! Stream Reading
//!
//! Plain point-in-time reads, no locks. Events always come back ascending by
//! `version`: `created_at` order can disagree with version order when clocks
//! skew or writers retry, so it is never used for replay.

use crate::types::{RecordedEvent, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Payloads of every event in the stream, in version order.
///
/// A stream that was never appended to yields an empty vector.
pub async fn load_stream(pool: &PgPool, stream_id: Uuid) -> Result<Vec<serde_json::Value>> {
    let payloads = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT data FROM events WHERE stream_id = $1 ORDER BY version ASC",
    )
    .bind(stream_id)
    .fetch_all(pool)
    .await?;

    Ok(payloads)
}

/// Full events from `from_version` (inclusive) onwards, in version order.
pub async fn load_events(
    pool: &PgPool,
    stream_id: Uuid,
    from_version: i64,
) -> Result<Vec<RecordedEvent>> {
    let events = sqlx::query_as::<_, RecordedEvent>(
        r#"
        SELECT id, stream_id, version, type, data, created_at
        FROM events
        WHERE stream_id = $1 AND version >= $2
        ORDER BY version ASC
        "#,
    )
    .bind(stream_id)
    .bind(from_version)
    .fetch_all(pool)
    .await?;

    Ok(events)
}
