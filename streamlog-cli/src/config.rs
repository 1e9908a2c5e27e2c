//! CLI configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{CliError, CliResult};
use std::env;
use std::time::Duration;
use streamlog_db::PoolConfig;
use streamlog_eventlog::{AppendOptions, IsolationLevel};

// =============================================================================
// Configuration
// =============================================================================

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Append protocol options
    pub append: AppendOptions,

    /// Log output format
    pub log_format: LogFormat,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string, required by every command that touches the store
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
    /// Pool acquire timeout
    pub acquire_timeout: Duration,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> CliResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::load_environment(&lookup)?;
        let database = Self::load_database_config(&lookup)?;
        let append = Self::load_append_options(&lookup)?;
        let log_format = Self::load_log_format(&lookup)?;

        Ok(Self {
            database,
            append,
            log_format,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 2,
                acquire_timeout: Duration::from_secs(1),
            },
            append: AppendOptions::default(),
            log_format: LogFormat::Pretty,
            environment: Environment::Test,
        }
    }

    /// Pool settings, failing if no database URL was configured.
    pub fn pool_config(&self) -> CliResult<PoolConfig> {
        let url = self.database.url.clone().ok_or_else(|| {
            CliError::Config("DATABASE_URL environment variable is required".to_string())
        })?;

        Ok(PoolConfig {
            database_url: url,
            max_connections: self.database.max_connections,
            acquire_timeout: self.database.acquire_timeout,
        })
    }

    fn load_environment<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<Environment> {
        let env_str = lookup("STREAMLOG_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(CliError::Config(format!(
                "Invalid STREAMLOG_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_database_config<F: Fn(&str) -> Option<String>>(
        lookup: &F,
    ) -> CliResult<DatabaseConfig> {
        let url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());
        let max_connections = Self::load_number(lookup, "STREAMLOG_DB_MAX_CONNECTIONS", 10u32)?;
        let acquire_timeout_secs =
            Self::load_number(lookup, "STREAMLOG_DB_ACQUIRE_TIMEOUT_SECS", 5u64)?;

        if max_connections == 0 {
            return Err(CliError::Config(
                "STREAMLOG_DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        Ok(DatabaseConfig {
            url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    fn load_append_options<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<AppendOptions> {
        let isolation = match lookup("STREAMLOG_ISOLATION") {
            Some(val) => val.parse::<IsolationLevel>().map_err(|e| {
                CliError::Config(format!("Invalid STREAMLOG_ISOLATION value: {}", e))
            })?,
            None => IsolationLevel::default(),
        };

        Ok(AppendOptions::default().with_isolation(isolation))
    }

    fn load_log_format<F: Fn(&str) -> Option<String>>(lookup: &F) -> CliResult<LogFormat> {
        match lookup("STREAMLOG_LOG_FORMAT")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("pretty") => Ok(LogFormat::Pretty),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(CliError::Config(format!(
                "Invalid STREAMLOG_LOG_FORMAT: {}. Expected: pretty, json",
                other
            ))),
        }
    }

    fn load_number<F, T>(lookup: &F, key: &str, default: T) -> CliResult<T>
    where
        F: Fn(&str) -> Option<String>,
        T: std::str::FromStr,
    {
        match lookup(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| CliError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                acquire_timeout: Duration::from_secs(5),
            },
            append: AppendOptions::default(),
            log_format: LogFormat::Pretty,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.append.isolation, IsolationLevel::ReadCommitted);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.environment, Environment::Test);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert!(config.database.url.is_none());
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.pool_config().is_err());
    }

    #[test]
    fn test_full_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://u:p@db/streamlog"),
            ("STREAMLOG_ENV", "prod"),
            ("STREAMLOG_DB_MAX_CONNECTIONS", "32"),
            ("STREAMLOG_DB_ACQUIRE_TIMEOUT_SECS", "9"),
            ("STREAMLOG_ISOLATION", "serializable"),
            ("STREAMLOG_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.append.isolation, IsolationLevel::Serializable);
        assert_eq!(config.log_format, LogFormat::Json);

        let pool = config.pool_config().unwrap();
        assert_eq!(pool.database_url, "postgresql://u:p@db/streamlog");
        assert_eq!(pool.max_connections, 32);
        assert_eq!(pool.acquire_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_weak_isolation_rejected() {
        let result = Config::from_lookup(lookup_from(&[("STREAMLOG_ISOLATION", "read_uncommitted")]));

        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("STREAMLOG_DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STREAMLOG_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STREAMLOG_ENV", "staging")])).is_err());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
