//! Database lifecycle management for streamlog.
//!
//! Opens the pool, runs migrations and reports migration status. The event
//! log itself only ever receives an already-open, already-migrated pool.

mod pool;

pub use pool::{connect, PoolConfig};

use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Run all pending migrations.
///
/// Uses sqlx migrations from the workspace `migrations` directory.
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Migrations completed successfully");
    Ok(())
}

/// Connect and migrate in one step.
pub async fn bootstrap(config: &PoolConfig) -> Result<PgPool> {
    let pool = connect(config).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Check database connectivity and migration status.
pub async fn status(pool: &PgPool) -> Result<()> {
    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    // Runtime query: the migrations table may not exist yet
    let rows = sqlx::query(
        r#"
        SELECT version, description, installed_on::TEXT AS installed_on, success
        FROM _sqlx_migrations
        ORDER BY version DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await;

    match rows {
        Ok(migs) if !migs.is_empty() => {
            info!("Latest migrations:");
            for mig in migs {
                let version: i64 = mig.try_get("version")?;
                let description: String = mig.try_get("description")?;
                let installed_on: Option<String> = mig.try_get("installed_on")?;
                let success: bool = mig.try_get("success")?;

                let status = if success { "ok" } else { "FAILED" };
                info!(
                    "  [{}] v{}: {} ({})",
                    status,
                    version,
                    description,
                    installed_on.unwrap_or_else(|| "N/A".to_string())
                );
            }
        },
        Ok(_) => {
            warn!("No migrations found in database (run `streamlog db migrate` first)");
        },
        Err(e) => {
            if e.to_string().contains("_sqlx_migrations") {
                warn!("Migration table not found (run `streamlog db migrate` first)");
            } else {
                return Err(e.into());
            }
        },
    }

    let streams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM streams")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    info!(streams, "Streams on record");

    Ok(())
}
