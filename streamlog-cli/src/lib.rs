//! streamlog command-line library
//!
//! Bootstrap and operator entry point for the event log.
//!
//! # Components
//!
//! - **Config**: Environment-based configuration
//! - **Commands**: `db` (migrations, status) and `stream` (append, load, show)
//! - **Logging**: `tracing` subscriber setup

#![warn(clippy::all)]

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use commands::{run, Command, USAGE};
pub use config::{Config, DatabaseConfig, Environment, LogFormat};
pub use error::{CliError, CliResult};
pub use logging::init_tracing;
