//! Test helpers for streamlog database-backed and in-memory tests.
//!
//! Provides schema setup, stream id and payload fixtures, and drivers for
//! sequential and concurrent appends.

mod helpers;

pub use helpers::{
    append_concurrent, append_sequential, new_stream_id, payload, test_event, AppendTally,
    TEST_EVENT_TYPE,
};

use anyhow::Result;
use sqlx::PgPool;

/// Setup a clean test database by running migrations.
///
/// Convenience function for tests that need a fresh schema.
/// Note: migrations are located at `migrations/` relative to workspace root.
pub async fn setup_test_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../migrations").run(pool).await?;
    Ok(())
}
