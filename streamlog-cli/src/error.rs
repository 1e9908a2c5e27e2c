//! CLI error types.

use streamlog_eventlog::EventLogError;
use thiserror::Error;

/// CLI-level errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Event log error
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad command line
    #[error("Usage error: {0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
