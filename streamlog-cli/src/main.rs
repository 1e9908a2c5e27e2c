//! streamlog CLI
//!
//! # Usage
//!
//! ```bash
//! # Create the streams/events tables
//! DATABASE_URL=postgresql://localhost/streamlog cargo run -p streamlog-cli -- db migrate
//!
//! # Append to a fresh stream, then read it back
//! streamlog stream append 0190f0c2-7d4e-7cc1-9a51-3f1e8f0d2a11 invoice InvoiceIssued '{"key":"value"}' -1
//! streamlog stream load 0190f0c2-7d4e-7cc1-9a51-3f1e8f0d2a11
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `STREAMLOG_ENV`: Environment (test, development, production)
//! - `STREAMLOG_DB_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `STREAMLOG_DB_ACQUIRE_TIMEOUT_SECS`: Pool acquire timeout (default: 5)
//! - `STREAMLOG_ISOLATION`: Append isolation level (default: read_committed)
//! - `STREAMLOG_LOG_FORMAT`: pretty or json (default: pretty)

use streamlog_cli::{init_tracing, run, Command, Config};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(config.log_format)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        isolation = %config.append.isolation,
        "streamlog"
    );

    run(command, &config).await
}
