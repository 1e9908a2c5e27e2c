//! Event Log Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Version of a stream that has no events yet.
pub const INITIAL_STREAM_VERSION: i64 = -1;

/// Upper bound for `streams.type` and `events.type` (VARCHAR(255)).
pub const MAX_TYPE_LEN: usize = 255;

// SQLSTATE codes the append protocol reacts to
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
pub(crate) const SERIALIZATION_FAILURE: &str = "40001";
pub(crate) const DEADLOCK_DETECTED: &str = "40P01";

/// A row of the stream directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stream {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub stream_type: String,
    /// Version of the last appended event, `-1` while empty
    pub version: i64,
}

impl Stream {
    /// True while no event has been committed to the stream.
    pub fn is_empty(&self) -> bool {
        self.version == INITIAL_STREAM_VERSION
    }

    /// Number of events committed to the stream.
    pub fn len(&self) -> u64 {
        (self.version + 1) as u64
    }
}

/// A committed event, as read back from the log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecordedEvent {
    pub id: Uuid,
    pub stream_id: Uuid,
    /// Position in the stream, 0-based
    pub version: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub event_type: String,
    #[sqlx(rename = "data")]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An event to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl NewEvent {
    /// Create a new event
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Result of a committed append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub event_id: Uuid,
    pub stream_id: Uuid,
    /// Version of the appended event, which is also the new stream version
    pub version: i64,
    /// Whether this append created the stream row
    pub created_stream: bool,
}

/// Transaction isolation used by the append protocol.
///
/// There is no `ReadUncommitted` variant: reading another writer's uncommitted
/// version would let two appenders target the same event version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Statement that must run before anything else in the transaction.
    pub fn set_transaction_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = EventLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            "read_uncommitted" => Err(EventLogError::InvalidInput(
                "READ UNCOMMITTED is too weak for optimistic appends".to_string(),
            )),
            other => Err(EventLogError::InvalidInput(format!(
                "Unknown isolation level: {}. Expected: read_committed, repeatable_read, serializable",
                other
            ))),
        }
    }
}

/// Knobs for the append protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    pub isolation: IsolationLevel,
}

impl AppendOptions {
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }
}

/// How a caller should react to an [`EventLogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stale expected version: re-read, re-decide, retry
    Conflict,
    /// Connection or transport failure: safe to retry from scratch
    Transient,
    /// Broken invariant or unexpected store failure: stop
    Fatal,
    /// Rejected before touching the store
    InvalidInput,
}

/// Event log errors
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Version conflict on stream {stream_id}: expected version {expected} is stale")]
    Conflict { stream_id: Uuid, expected: i64 },

    #[error("Transient store failure: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("Invariant violated in {step}: expected 1 row affected, got {rows}")]
    InvariantViolation { step: &'static str, rows: u64 },

    #[error("Rollback failed after {cause}: {source}")]
    RollbackFailed {
        cause: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EventLogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventLogError::Conflict { .. } => ErrorKind::Conflict,
            EventLogError::Transient(_) => ErrorKind::Transient,
            EventLogError::InvariantViolation { .. }
            | EventLogError::RollbackFailed { .. }
            | EventLogError::Database(_) => ErrorKind::Fatal,
            EventLogError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Transient failures may be retried as-is. Conflicts need a fresh read first.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

impl From<sqlx::Error> for EventLogError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            EventLogError::Transient(err)
        } else {
            EventLogError::Database(err)
        }
    }
}

/// SQLSTATE of a database error, if any.
pub(crate) fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Connection-level failures, plus the SQLSTATE classes PostgreSQL uses for them.
pub(crate) fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(_) => match sqlstate(err) {
            // 08: connection exception, 57P: operator intervention (shutdown)
            Some(code) => {
                code.starts_with("08") || code.starts_with("57P") || code == DEADLOCK_DETECTED
            },
            None => false,
        },
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, EventLogError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    #[test]
    fn test_connection_failures_are_transient() {
        assert!(EventLogError::from(io_error()).is_retryable());
        assert!(EventLogError::from(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(EventLogError::from(sqlx::Error::PoolClosed).is_retryable());
    }

    #[test]
    fn test_other_store_errors_are_fatal() {
        let err = EventLogError::from(sqlx::Error::RowNotFound);

        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(!err.is_retryable());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_is_distinguishable() {
        let err = EventLogError::Conflict {
            stream_id: Uuid::new_v4(),
            expected: 3,
        };

        assert!(err.is_conflict());
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("expected version 3"));
    }

    #[test]
    fn test_invariant_violation_is_fatal() {
        let err = EventLogError::InvariantViolation {
            step: "bump stream version",
            rows: 2,
        };

        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Invariant violated in bump stream version: expected 1 row affected, got 2"
        );
    }

    #[test]
    fn test_isolation_level_parsing() {
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "REPEATABLE READ".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );

        let err = "read_uncommitted".parse::<IsolationLevel>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_isolation_defaults_to_read_committed() {
        let options = AppendOptions::default();

        assert_eq!(options.isolation, IsolationLevel::ReadCommitted);
        assert_eq!(
            options.isolation.set_transaction_sql(),
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED"
        );
    }

    #[test]
    fn test_stream_emptiness() {
        let stream = Stream {
            id: Uuid::new_v4(),
            stream_type: "invoice".to_string(),
            version: INITIAL_STREAM_VERSION,
        };
        assert!(stream.is_empty());
        assert_eq!(stream.len(), 0);

        let stream = Stream { version: 4, ..stream };
        assert!(!stream.is_empty());
        assert_eq!(stream.len(), 5);
    }
}
