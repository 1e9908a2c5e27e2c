//! Event Log Module
//!
//! Append-only event streams with:
//! - Lazy stream creation (insert-if-absent, safe under races)
//! - Optimistic concurrency via an expected stream version
//! - Conditional writes only: no in-process locks, every race is settled
//!   by the database
//! - Replay in version order
//!
//! # Usage
//!
//! ```rust,no_run
//! use streamlog_eventlog::{EventStore, NewEvent, PgEventStore};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = sqlx::PgPool::connect("postgresql://...").await?;
//! let store = PgEventStore::new(pool);
//! let stream_id = Uuid::now_v7();
//!
//! let event = NewEvent::new("InvoiceIssued", serde_json::json!({ "amount": "120.00" }));
//! let outcome = store.append(stream_id, "invoice", event, -1).await?;
//! assert_eq!(outcome.version, 0);
//!
//! let payloads = store.load(stream_id).await?;
//! assert_eq!(payloads.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod append;
pub mod directory;
pub mod load;
pub mod memory;
pub mod store;
pub mod types;

pub use append::{append_event, append_event_tx};
pub use load::{load_events, load_stream};
pub use memory::MemoryEventStore;
pub use store::{EventStore, PgEventStore};
pub use types::{
    AppendOptions, AppendOutcome, ErrorKind, EventLogError, IsolationLevel, NewEvent,
    RecordedEvent, Result, Stream, INITIAL_STREAM_VERSION, MAX_TYPE_LEN,
};
