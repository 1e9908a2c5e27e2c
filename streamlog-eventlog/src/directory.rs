//! Stream Directory
//!
//! Maps a stream id to its type and current version. Every write here is a
//! conditional write: the row count tells the caller whether it won.

use crate::types::{EventLogError, Result, Stream, INITIAL_STREAM_VERSION};
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

/// Current version of a stream, `None` if the stream does not exist.
pub async fn stream_version(conn: &mut PgConnection, stream_id: Uuid) -> Result<Option<i64>> {
    let version = sqlx::query_scalar::<_, i64>("SELECT version FROM streams WHERE id = $1")
        .bind(stream_id)
        .fetch_optional(conn)
        .await?;

    Ok(version)
}

/// Full directory row for a stream.
pub async fn find_stream(conn: &mut PgConnection, stream_id: Uuid) -> Result<Option<Stream>> {
    let stream = sqlx::query_as::<_, Stream>("SELECT id, type, version FROM streams WHERE id = $1")
        .bind(stream_id)
        .fetch_optional(conn)
        .await?;

    Ok(stream)
}

/// Insert the stream at version `-1` unless it already exists.
///
/// Returns `false` when a concurrent creator got there first. That is not an
/// error: the stream exists now and the caller appends against it.
pub async fn create_stream(
    conn: &mut PgConnection,
    stream_id: Uuid,
    stream_type: &str,
) -> Result<bool> {
    let rows = sqlx::query(
        r#"
        INSERT INTO streams (id, type, version)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(stream_id)
    .bind(stream_type)
    .bind(INITIAL_STREAM_VERSION)
    .execute(conn)
    .await?
    .rows_affected();

    match rows {
        1 => {
            info!(stream_id = %stream_id, stream_type = %stream_type, "Stream created");
            Ok(true)
        },
        0 => {
            warn!(stream_id = %stream_id, "Stream created concurrently by another writer");
            Ok(false)
        },
        rows => Err(EventLogError::InvariantViolation {
            step: "create stream",
            rows,
        }),
    }
}

/// Compare-and-swap the stream version from `from_version` to `from_version + 1`.
///
/// Returns `false` if the stored version is no longer `from_version`.
pub async fn bump_version(
    conn: &mut PgConnection,
    stream_id: Uuid,
    from_version: i64,
) -> Result<bool> {
    let rows = sqlx::query("UPDATE streams SET version = $1 WHERE id = $2 AND version = $3")
        .bind(from_version + 1)
        .bind(stream_id)
        .bind(from_version)
        .execute(conn)
        .await?
        .rows_affected();

    match rows {
        1 => Ok(true),
        0 => Ok(false),
        rows => Err(EventLogError::InvariantViolation {
            step: "bump stream version",
            rows,
        }),
    }
}
