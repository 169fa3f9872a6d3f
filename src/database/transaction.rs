use std::marker::PhantomData;

use sqlx::{Connection, Database, Postgres};
use tracing::{error, warn};

use crate::database::manager::{BoxedOperation, DbFuture};
use crate::error::AppError;

/// Transaction helpers over a single connection.
///
/// Opening a scope on a connection that is already inside a transaction
/// creates a savepoint, so these compose.
pub struct TransactionManager<DB: Database = Postgres> {
    _database: PhantomData<DB>,
}

pub type PgTransactionManager = TransactionManager<Postgres>;

impl<DB: Database> TransactionManager<DB> {
    /// Execute multiple operations in a single transaction.
    pub async fn transaction<T>(
        conn: &mut DB::Connection,
        operations: &[BoxedOperation<DB, T>],
    ) -> Result<Vec<T>, AppError>
    where
        T: Send,
    {
        let mut tx = conn.begin().await?;
        let mut results = Vec::with_capacity(operations.len());

        for operation in operations {
            let outcome = operation(&mut *tx).await;
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    error!("Transaction failed: {}", e);
                    if let Err(rollback_error) = tx.rollback().await {
                        warn!("Transaction rollback failed: {}", rollback_error);
                    }
                    return Err(e);
                }
            }
        }

        tx.commit().await?;
        Ok(results)
    }

    /// Execute one operation under a savepoint for partial rollback.
    ///
    /// A failure rolls back only what `operation` did; the enclosing
    /// transaction on `conn` stays usable.
    pub async fn savepoint<T, F>(conn: &mut DB::Connection, operation: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut DB::Connection) -> DbFuture<'c, T>,
    {
        let mut nested = conn.begin().await?;
        let outcome = operation(&mut *nested).await;

        match outcome {
            Ok(value) => {
                nested.commit().await?;
                Ok(value)
            }
            Err(e) => {
                error!("Savepoint operation failed: {}", e);
                if let Err(rollback_error) = nested.rollback().await {
                    warn!("Savepoint rollback failed: {}", rollback_error);
                }
                Err(e)
            }
        }
    }
}
