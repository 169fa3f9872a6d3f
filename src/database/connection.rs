use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Serialize;
use sqlx::pool::PoolOptions;
use sqlx::{ConnectOptions, Connection, Database, PgPool, Pool, Row};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::{AppError, RetryConfig};

const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(5);
const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Connections older than this are recycled
    pub max_lifetime_secs: u64,
    /// Ping connections before handing them out
    pub test_before_acquire: bool,
    /// Echo every statement at debug level
    pub log_statements: bool,
    pub retry: RetryConfig,
    pub batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 50,  // 20 pooled + 30 overflow
            min_connections: 5,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 3600,
            test_before_acquire: true,
            log_statements: false,
            retry: RetryConfig::for_database(),
            batch_size: 100,
        }
    }
}

impl DatabaseConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            log_statements: settings.is_debug_logging(),
            retry: RetryConfig::for_database()
                .with_max_attempts(settings.database.max_retries)
                .with_base_delay(settings.database.retry_base_delay_ms),
            batch_size: settings.database.batch_size,
            ..Self::default()
        }
    }

    pub fn pool_options<DB: Database>(&self) -> PoolOptions<DB> {
        PoolOptions::<DB>::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .test_before_acquire(self.test_before_acquire)
    }

    /// Parse the URL into driver connect options with statement logging applied.
    pub fn connect_options<DB: Database>(
        &self,
        database_url: &str,
    ) -> Result<<DB::Connection as Connection>::Options, AppError> {
        let options = <DB::Connection as Connection>::Options::from_str(database_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid database URL: {}", e)))?;

        let statement_level = if self.log_statements { LevelFilter::Debug } else { LevelFilter::Trace };

        Ok(options
            .log_statements(statement_level)
            .log_slow_statements(LevelFilter::Warn, SLOW_STATEMENT_THRESHOLD))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionPoolStats {
    pub size: u32,
    pub idle: u32,
    pub active: u32,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealthStatus {
    pub is_healthy: bool,
    pub version: String,
    pub pool_stats: ConnectionPoolStats,
    pub response_time_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Open a pool and wait for the first connection.
pub async fn establish_connection<DB: Database>(
    database_url: &str,
    config: &DatabaseConfig,
) -> Result<Pool<DB>, AppError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Establishing database connection"
    );

    let options = config.connect_options::<DB>(database_url)?;
    let pool = config
        .pool_options::<DB>()
        .connect_with(options)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            AppError::DatabaseError(format!("Connection failed: {}", e))
        })?;

    warm_up_pool(&pool).await;

    info!("Database connection established successfully");
    Ok(pool)
}

/// Build a pool that opens connections on first use.
pub fn establish_lazy_connection<DB: Database>(
    database_url: &str,
    config: &DatabaseConfig,
) -> Result<Pool<DB>, AppError> {
    let options = config.connect_options::<DB>(database_url)?;
    Ok(config.pool_options::<DB>().connect_lazy_with(options))
}

/// Acquire and ping a connection; true when the database answered in time.
pub async fn ping_pool<DB: Database>(pool: &Pool<DB>) -> Result<(), AppError> {
    let probe = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    };

    timeout(CONNECTION_TEST_TIMEOUT, probe)
        .await
        .map_err(|_| AppError::DatabaseError("Connection test timed out".to_string()))?
        .map_err(|e| AppError::DatabaseError(format!("Connection test failed: {}", e)))
}

pub async fn test_connection(pool: &PgPool) -> Result<(), AppError> {
    timeout(CONNECTION_TEST_TIMEOUT, async {
        sqlx::query("SELECT 1").fetch_one(pool).await
    })
    .await
    .map_err(|_| AppError::DatabaseError("Connection test timed out".to_string()))?
    .map_err(|e| AppError::DatabaseError(format!("Connection test failed: {}", e)))?;

    Ok(())
}

/// Perform comprehensive database health check
pub async fn health_check(pool: &PgPool) -> Result<DatabaseHealthStatus, AppError> {
    let start_time = std::time::Instant::now();

    test_connection(pool).await?;

    let version_row = sqlx::query("SELECT version() AS version")
        .fetch_one(pool)
        .await?;
    let version: String = version_row.try_get("version")?;

    Ok(DatabaseHealthStatus {
        is_healthy: true,
        version,
        pool_stats: get_pool_stats(pool),
        response_time_ms: start_time.elapsed().as_millis() as u64,
        timestamp: chrono::Utc::now(),
    })
}

pub fn get_pool_stats<DB: Database>(pool: &Pool<DB>) -> ConnectionPoolStats {
    let size = pool.size();
    let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(size);

    ConnectionPoolStats {
        size,
        idle,
        active: size - idle,
        max_connections: pool.options().get_max_connections(),
        min_connections: pool.options().get_min_connections(),
    }
}

/// Touch the minimum number of connections so the first requests don't pay for the handshake.
async fn warm_up_pool<DB: Database>(pool: &Pool<DB>) {
    let min_connections = pool.options().get_min_connections();
    let mut warmed = Vec::new();

    for i in 0..min_connections {
        match pool.acquire().await {
            Ok(conn) => warmed.push(conn),
            Err(e) => {
                warn!("Failed to warm up connection {}/{}: {}", i + 1, min_connections, e);
                break;
            }
        }
    }

    info!("Connection pool warmed up: {}/{} connections established", warmed.len(), min_connections);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pool_sizing() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.max_lifetime_secs, 3600);
        assert!(config.test_before_acquire);
        assert!(!config.log_statements);
    }

    #[test]
    fn test_from_settings_carries_retry_policy() {
        let mut settings = Settings::default();
        settings.database.max_retries = 5;
        settings.database.retry_base_delay_ms = 250;
        settings.logging.level = "debug".to_string();

        let config = DatabaseConfig::from_settings(&settings);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 250);
        assert!(config.log_statements);
    }

    #[test]
    fn test_rejects_malformed_url() {
        let config = DatabaseConfig::default();
        let result = config.connect_options::<sqlx::Postgres>("not a url");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
