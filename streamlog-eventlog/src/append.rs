//! Event Appending with Optimistic Concurrency
//!
//! One append is one transaction:
//!
//! 1. look the stream up, creating it at version `-1` if absent
//! 2. insert the event at `expected_version + 1`, guarded by the stream row
//!    still being at `expected_version`
//! 3. compare-and-swap the stream version to `expected_version + 1`
//!
//! Any write that touches zero rows means the caller's view is stale and the
//! whole transaction is rolled back. A unique violation on
//! `(stream_id, version)` is treated the same way.

use crate::directory;
use crate::types::{
    is_transient, sqlstate, AppendOptions, AppendOutcome, EventLogError, NewEvent, Result,
    INITIAL_STREAM_VERSION, MAX_TYPE_LEN, SERIALIZATION_FAILURE, UNIQUE_VIOLATION,
};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Append a single event to a stream.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `stream_id` - Stream identifier
/// * `stream_type` - Stream classification, only used when the stream is created
/// * `event` - Event type and payload
/// * `expected_version` - Version the caller last observed (`-1` for a new stream)
/// * `options` - Isolation level for the transaction
///
/// # Errors
/// - `Conflict` if `expected_version` no longer matches the stored version
/// - `Transient` on connection failures
/// - `InvariantViolation` / `RollbackFailed` / `Database` on anything that
///   should stop the caller
pub async fn append_event(
    pool: &PgPool,
    stream_id: Uuid,
    stream_type: &str,
    event: NewEvent,
    expected_version: i64,
    options: &AppendOptions,
) -> Result<AppendOutcome> {
    validate_append(stream_type, &event, expected_version)?;

    let mut tx = pool.begin().await?;

    // Must precede every other statement in the transaction
    if let Err(err) = sqlx::query(options.isolation.set_transaction_sql())
        .execute(&mut *tx)
        .await
    {
        return abort(tx, err.into()).await;
    }

    let outcome = match append_event_tx(&mut tx, stream_id, stream_type, event, expected_version)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return abort(tx, err).await,
    };

    // A failed commit has already ended the transaction server-side
    tx.commit()
        .await
        .map_err(|e| write_conflict(e.into(), stream_id, expected_version))?;

    debug!(
        event_id = %outcome.event_id,
        stream_id = %stream_id,
        version = outcome.version,
        isolation = %options.isolation,
        "Event appended"
    );

    Ok(outcome)
}

/// Append within an existing transaction.
///
/// Use this when the append has to commit together with other writes. On
/// error the transaction is left for the caller to roll back.
pub async fn append_event_tx(
    tx: &mut Transaction<'_, Postgres>,
    stream_id: Uuid,
    stream_type: &str,
    event: NewEvent,
    expected_version: i64,
) -> Result<AppendOutcome> {
    validate_append(stream_type, &event, expected_version)?;

    append_on_connection(&mut **tx, stream_id, stream_type, event, expected_version)
        .await
        .map_err(|e| write_conflict(e, stream_id, expected_version))
}

async fn append_on_connection(
    conn: &mut PgConnection,
    stream_id: Uuid,
    stream_type: &str,
    event: NewEvent,
    expected_version: i64,
) -> Result<AppendOutcome> {
    let conflict = || EventLogError::Conflict {
        stream_id,
        expected: expected_version,
    };

    // 1. Ensure the stream exists
    let created_stream = match directory::stream_version(&mut *conn, stream_id).await? {
        Some(_) => false,
        None => directory::create_stream(&mut *conn, stream_id, stream_type).await?,
    };

    // 2. Guarded insert at the next version
    let event_id = Uuid::now_v7();
    let next_version = expected_version + 1;

    let rows = sqlx::query(
        r#"
        INSERT INTO events (id, stream_id, version, data, type)
        SELECT $1, $2, $3, $4, $5
        WHERE EXISTS (
            SELECT 1 FROM streams WHERE id = $2 AND version = $6
        )
        "#,
    )
    .bind(event_id)
    .bind(stream_id)
    .bind(next_version)
    .bind(&event.payload)
    .bind(&event.event_type)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    match rows {
        1 => {},
        0 => {
            warn!(
                stream_id = %stream_id,
                expected_version,
                "Append rejected: stream is no longer at expected version"
            );
            return Err(conflict());
        },
        rows => {
            error!(stream_id = %stream_id, rows, "Guarded event insert touched more than one row");
            return Err(EventLogError::InvariantViolation {
                step: "insert event",
                rows,
            });
        },
    }

    // 3. Advance the stream version
    if !directory::bump_version(&mut *conn, stream_id, expected_version).await? {
        warn!(
            stream_id = %stream_id,
            expected_version,
            "Append rejected: stream version moved before the version bump"
        );
        return Err(conflict());
    }

    Ok(AppendOutcome {
        event_id,
        stream_id,
        version: next_version,
        created_stream,
    })
}

/// Reject arguments the store would never accept.
pub(crate) fn validate_append(
    stream_type: &str,
    event: &NewEvent,
    expected_version: i64,
) -> Result<()> {
    if expected_version < INITIAL_STREAM_VERSION {
        return Err(EventLogError::InvalidInput(format!(
            "expected version must be >= {}, got {}",
            INITIAL_STREAM_VERSION, expected_version
        )));
    }
    if expected_version == i64::MAX {
        return Err(EventLogError::InvalidInput(
            "expected version leaves no room for another event".to_string(),
        ));
    }
    validate_type("stream type", stream_type)?;
    validate_type("event type", &event.event_type)?;
    Ok(())
}

fn validate_type(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EventLogError::InvalidInput(format!("{} must not be empty", what)));
    }
    if value.chars().count() > MAX_TYPE_LEN {
        return Err(EventLogError::InvalidInput(format!(
            "{} longer than {} characters",
            what, MAX_TYPE_LEN
        )));
    }
    Ok(())
}

/// Map store-level write races onto `Conflict`.
///
/// The `(stream_id, version)` unique key firing, or a serialization failure
/// under REPEATABLE READ / SERIALIZABLE, both mean another writer took the
/// version first.
fn write_conflict(err: EventLogError, stream_id: Uuid, expected_version: i64) -> EventLogError {
    let lost_race = matches!(
        &err,
        EventLogError::Database(db_err)
            if matches!(
                sqlstate(db_err).as_deref(),
                Some(UNIQUE_VIOLATION) | Some(SERIALIZATION_FAILURE)
            )
    );
    if !lost_race {
        return err;
    }

    warn!(
        stream_id = %stream_id,
        expected_version,
        error = %err,
        "Append rejected by the store"
    );
    EventLogError::Conflict {
        stream_id,
        expected: expected_version,
    }
}

/// Roll back and surface `err`.
///
/// A rollback that fails because the connection is gone is harmless (the
/// server discards the transaction). Any other rollback failure is fatal.
async fn abort<T>(tx: Transaction<'_, Postgres>, err: EventLogError) -> Result<T> {
    match tx.rollback().await {
        Ok(()) => Err(err),
        Err(rollback_err) if is_transient(&rollback_err) => {
            warn!(error = %rollback_err, cause = %err, "Rollback skipped, connection lost");
            Err(err)
        },
        Err(rollback_err) => {
            error!(error = %rollback_err, cause = %err, "Rollback failed");
            Err(EventLogError::RollbackFailed {
                cause: err.to_string(),
                source: rollback_err,
            })
        },
    }
}
