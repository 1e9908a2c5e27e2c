//! Connection pool construction.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::Result;

/// Pool settings.
///
/// `max_connections` bounds how many appends can be in flight at once; it
/// has no bearing on correctness.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a pool and check that the database answers.
pub async fn connect(config: &PoolConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::new("postgresql://localhost/streamlog");

        assert_eq!(config.database_url, "postgresql://localhost/streamlog");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = PoolConfig::new("not a url");

        assert!(connect(&config).await.is_err());
    }
}
