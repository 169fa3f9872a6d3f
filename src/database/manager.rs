//! Connection pool ownership, retrying operations, and batched transactions.

use futures::future::BoxFuture;
use sqlx::{Database, Pool, Postgres};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::database::connection::{
    establish_connection, establish_lazy_connection, get_pool_stats, ping_pool, ConnectionPoolStats,
    DatabaseConfig,
};
use crate::error::{is_retryable_error, AppError};

/// Future returned by a database operation, borrowing the connection it runs on.
pub type DbFuture<'c, T> = BoxFuture<'c, Result<T, AppError>>;

/// A type-erased operation, for running lists of operations in batches or transactions.
pub type BoxedOperation<DB, T> =
    Box<dyn for<'c> Fn(&'c mut <DB as Database>::Connection) -> DbFuture<'c, T> + Send + Sync>;

/// Box an operation closure.
///
/// ```ignore
/// let op = boxed_operation::<Postgres, _, _>(move |conn| Box::pin(async move {
///     sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(id).execute(conn).await?;
///     Ok(())
/// }));
/// ```
pub fn boxed_operation<DB, T, F>(operation: F) -> BoxedOperation<DB, T>
where
    DB: Database,
    F: for<'c> Fn(&'c mut DB::Connection) -> DbFuture<'c, T> + Send + Sync + 'static,
{
    Box::new(operation)
}

/// Owns the connection pool and everything needed to rebuild it.
pub struct DatabaseManager<DB: Database = Postgres> {
    pool: RwLock<Pool<DB>>,
    database_url: String,
    config: DatabaseConfig,
}

impl<DB: Database> DatabaseManager<DB> {
    /// Connect eagerly; fails when the database is unreachable.
    pub async fn connect(database_url: &str, config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = establish_connection::<DB>(database_url, &config).await?;
        Ok(Self::from_parts(pool, database_url, config))
    }

    /// Build the pool without opening any connection.
    pub fn connect_lazy(database_url: &str, config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = establish_lazy_connection::<DB>(database_url, &config)?;
        Ok(Self::from_parts(pool, database_url, config))
    }

    fn from_parts(pool: Pool<DB>, database_url: &str, config: DatabaseConfig) -> Self {
        Self {
            pool: RwLock::new(pool),
            database_url: database_url.to_string(),
            config,
        }
    }

    /// Current pool handle. Handles are cheap clones of the same pool.
    pub async fn pool(&self) -> Pool<DB> {
        self.pool.read().await.clone()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn stats(&self) -> ConnectionPoolStats {
        get_pool_stats(&self.pool().await)
    }

    /// Check database connection health. Never fails; logs and reports `false`.
    pub async fn check_connection(&self) -> bool {
        match ping_pool(&self.pool().await).await {
            Ok(()) => true,
            Err(e) => {
                error!("Database connection check failed: {}", e);
                false
            }
        }
    }

    /// Replace the pool with a freshly built one and report its health.
    ///
    /// If the new pool cannot be built the current one is kept. The old pool
    /// is closed in the background once its borrowed connections come back.
    pub async fn reconnect(&self) -> bool {
        info!("Recreating database connection pool");

        let new_pool = match establish_connection::<DB>(&self.database_url, &self.config).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Database reconnection failed: {}", e);
                return false;
            }
        };

        let old_pool = {
            let mut current = self.pool.write().await;
            std::mem::replace(&mut *current, new_pool)
        };
        // Closing waits for checked-out connections; don't hold the caller on it.
        tokio::spawn(async move {
            old_pool.close().await;
            debug!("Previous database connection pool closed");
        });

        self.check_connection().await
    }

    /// Run `operation` with the configured attempt budget.
    pub async fn execute<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        F: for<'c> Fn(&'c mut DB::Connection) -> DbFuture<'c, T>,
    {
        self.execute_with_retry(operation, self.config.retry.max_attempts).await
    }

    /// Run `operation` on a pooled connection, retrying database failures.
    ///
    /// Between attempts the manager waits `base_delay * 2^attempt`, then
    /// checks the pool and rebuilds it if the check fails. Non-database
    /// errors are returned straight away. A budget of 0 still makes one attempt.
    pub async fn execute_with_retry<T, F>(&self, operation: F, max_retries: u32) -> Result<T, AppError>
    where
        F: for<'c> Fn(&'c mut DB::Connection) -> DbFuture<'c, T>,
    {
        let max_attempts = max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let pool = self.pool().await;
            let outcome = match pool.acquire().await {
                Ok(mut conn) => operation(&mut *conn).await,
                Err(e) => Err(AppError::from(e)),
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Database operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !is_retryable_error(&error) {
                return Err(error);
            }

            warn!(
                "Database operation failed (attempt {}/{}): {}",
                attempt + 1,
                max_attempts,
                error
            );
            last_error = Some(error);

            if attempt + 1 < max_attempts {
                sleep(self.config.retry.delay_for_attempt(attempt)).await;
                if !self.check_connection().await {
                    self.reconnect().await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::InternalError("Retry loop finished without an outcome".to_string())
        }))
    }

    /// Run `operations` with the configured batch size.
    pub async fn batch<T>(&self, operations: Vec<BoxedOperation<DB, T>>) -> Result<Vec<T>, AppError>
    where
        T: Send,
    {
        self.batch_operation(operations, self.config.batch_size).await
    }

    /// Execute operations in chunks of `batch_size`, one transaction per chunk.
    ///
    /// A failing operation rolls back its whole chunk and stops the batch;
    /// chunks committed before it stay committed. Batches are never retried,
    /// since a second run would repeat the committed chunks.
    pub async fn batch_operation<T>(
        &self,
        operations: Vec<BoxedOperation<DB, T>>,
        batch_size: usize,
    ) -> Result<Vec<T>, AppError>
    where
        T: Send,
    {
        if batch_size == 0 {
            return Err(AppError::ValidationError("Batch size must be greater than zero".to_string()));
        }

        let mut results = Vec::with_capacity(operations.len());
        if operations.is_empty() {
            return Ok(results);
        }

        let pool = self.pool().await;
        for (index, batch) in operations.chunks(batch_size).enumerate() {
            let mut tx = pool.begin().await?;
            let mut batch_results = Vec::with_capacity(batch.len());

            for operation in batch {
                let outcome = operation(&mut *tx).await;
                match outcome {
                    Ok(value) => batch_results.push(value),
                    Err(e) => {
                        error!(batch = index, "Batch operation failed: {}", e);
                        if let Err(rollback_error) = tx.rollback().await {
                            warn!(batch = index, "Batch rollback failed: {}", rollback_error);
                        }
                        return Err(e);
                    }
                }
            }

            tx.commit().await?;
            debug!(batch = index, operations = batch_results.len(), "Batch committed");
            results.extend(batch_results);
        }

        Ok(results)
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool().await.close().await;
        info!("Database connection pool closed");
    }
}
