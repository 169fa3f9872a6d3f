//! Retry, batching and transaction behaviour of the database layer,
//! exercised against file-backed SQLite databases.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bite_me_buddy::database::{boxed_operation, BoxedOperation, DatabaseConfig, DatabaseManager, TransactionManager};
use bite_me_buddy::error::{AppError, RetryConfig};
use sqlx::{Connection, Sqlite};
use tempfile::TempDir;
use tokio::time::timeout;

fn test_config() -> DatabaseConfig {
    DatabaseConfig {
        max_connections: 2,
        min_connections: 0,
        acquire_timeout_secs: 2,
        retry: RetryConfig::for_database().with_base_delay(1),
        batch_size: 2,
        ..DatabaseConfig::default()
    }
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("bmb.db").display())
}

async fn manager(dir: &TempDir) -> DatabaseManager<Sqlite> {
    let db = DatabaseManager::<Sqlite>::connect(&database_url(dir), test_config())
        .await
        .expect("sqlite database should open");

    sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)")
        .execute(&db.pool().await)
        .await
        .unwrap();
    db
}

async fn item_names(db: &DatabaseManager<Sqlite>) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM items ORDER BY name")
        .fetch_all(&db.pool().await)
        .await
        .unwrap()
}

fn insert(name: &str) -> BoxedOperation<Sqlite, i64> {
    let name = name.to_string();
    boxed_operation::<Sqlite, _, _>(move |conn| {
        let name = name.clone();
        Box::pin(async move {
            let result = sqlx::query("INSERT INTO items (name) VALUES (?)")
                .bind(name)
                .execute(conn)
                .await?;
            Ok(result.last_insert_rowid())
        })
    })
}

#[tokio::test]
async fn test_execute_returns_operation_result() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    let answer: i64 = db
        .execute(|conn| {
            Box::pin(async move {
                let value = sqlx::query_scalar("SELECT 42").fetch_one(conn).await?;
                Ok(value)
            })
        })
        .await
        .unwrap();

    assert_eq!(answer, 42);
}

#[tokio::test]
async fn test_retries_database_errors_until_success() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let result = db
        .execute_with_retry(
            |conn| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err(AppError::DatabaseError("connection reset".to_string()));
                    }
                    let value: i64 = sqlx::query_scalar("SELECT 7").fetch_one(conn).await?;
                    Ok(value)
                })
            },
            3,
        )
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_budget() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), AppError> = db
        .execute_with_retry(
            |_conn| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::DatabaseError("still down".to_string()))
                })
            },
            3,
        )
        .await;

    assert!(matches!(result, Err(AppError::DatabaseError(msg)) if msg == "still down"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        retry: RetryConfig::for_database().with_base_delay(20),
        ..test_config()
    };
    let db = DatabaseManager::<Sqlite>::connect(&database_url(&dir), config).await.unwrap();

    let started = Instant::now();
    let result: Result<(), AppError> = db
        .execute_with_retry(
            |_conn| Box::pin(async move { Err(AppError::DatabaseError("down".to_string())) }),
            3,
        )
        .await;

    assert!(result.is_err());
    // 20ms after the first failure, 40ms after the second, none after the last
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), AppError> = db
        .execute_with_retry(
            |_conn| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::ValidationError("quantity out of range".to_string()))
                })
            },
            5,
        )
        .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_budget_still_attempts_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), AppError> = db
        .execute_with_retry(
            |_conn| {
                let attempts = attempts.clone();
                Box::pin(async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::DatabaseError("down".to_string()))
                })
            },
            0,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unique_violation_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    let first = db.execute(|conn| insert("samosa")(conn)).await;
    assert!(first.is_ok());

    let duplicate = db.execute(|conn| insert("samosa")(conn)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_batch_returns_results_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    let operations = vec![insert("idli"), insert("vada"), insert("dosa"), insert("upma"), insert("poha")];
    let ids = db.batch_operation(operations, 2).await.unwrap();

    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(item_names(&db).await.len(), 5);
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    // chunks: [idli, vada] [dosa, idli] [upma]
    let operations = vec![insert("idli"), insert("vada"), insert("dosa"), insert("idli"), insert("upma")];
    let result = db.batch_operation(operations, 2).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(item_names(&db).await, vec!["idli".to_string(), "vada".to_string()]);
}

#[tokio::test]
async fn test_batch_uses_configured_size() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    // configured size 2: [a, b] commits, [c, a] rolls back
    let result = db.batch(vec![insert("a"), insert("b"), insert("c"), insert("a")]).await;

    assert!(result.is_err());
    assert_eq!(item_names(&db).await, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_failed_batch_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    let attempts = Arc::new(AtomicU32::new(0));

    let counter = attempts.clone();
    let failing = boxed_operation::<Sqlite, i64, _>(move |_conn| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::DatabaseError("connection reset".to_string()))
        })
    });

    let result = db.batch(vec![insert("lassi"), failing]).await;

    assert!(matches!(result, Err(AppError::DatabaseError(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(item_names(&db).await.is_empty());
}

#[tokio::test]
async fn test_batch_edge_cases() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    let empty = db.batch_operation(Vec::<BoxedOperation<Sqlite, i64>>::new(), 10).await.unwrap();
    assert!(empty.is_empty());

    let zero = db.batch_operation(vec![insert("chai")], 0).await;
    assert!(matches!(zero, Err(AppError::ValidationError(_))));
    assert!(item_names(&db).await.is_empty());
}

#[tokio::test]
async fn test_transaction_rolls_back_everything_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    {
        let mut conn = db.pool().await.acquire().await.unwrap();
        let operations = vec![insert("kulfi"), insert("lassi"), insert("kulfi")];
        let result = TransactionManager::<Sqlite>::transaction(&mut *conn, &operations).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    assert!(item_names(&db).await.is_empty());
}

#[tokio::test]
async fn test_transaction_commits_all_operations() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    {
        let mut conn = db.pool().await.acquire().await.unwrap();
        let operations = vec![insert("kulfi"), insert("lassi")];
        let ids = TransactionManager::<Sqlite>::transaction(&mut *conn, &operations).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    assert_eq!(item_names(&db).await, vec!["kulfi".to_string(), "lassi".to_string()]);
}

#[tokio::test]
async fn test_failed_savepoint_leaves_outer_transaction_usable() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    {
        let mut conn = db.pool().await.acquire().await.unwrap();
        let mut tx = Connection::begin(&mut *conn).await.unwrap();

        insert("order")(&mut *tx).await.unwrap();

        let nested: Result<i64, AppError> = TransactionManager::<Sqlite>::savepoint(&mut *tx, |conn| {
            Box::pin(async move {
                insert("history")(&mut *conn).await?;
                Err(AppError::ValidationError("history write failed".to_string()))
            })
        })
        .await;
        assert!(nested.is_err());

        insert("items")(&mut *tx).await.unwrap();
        tx.commit().await.unwrap();
    }

    assert_eq!(item_names(&db).await, vec!["items".to_string(), "order".to_string()]);
}

#[tokio::test]
async fn test_successful_savepoint_commits_with_outer_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    {
        let mut conn = db.pool().await.acquire().await.unwrap();
        let mut tx = Connection::begin(&mut *conn).await.unwrap();

        let id = TransactionManager::<Sqlite>::savepoint(&mut *tx, |conn| insert("history")(conn))
            .await
            .unwrap();
        assert_eq!(id, 1);

        tx.commit().await.unwrap();
    }

    assert_eq!(item_names(&db).await, vec!["history".to_string()]);
}

#[tokio::test]
async fn test_reconnect_replaces_pool() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    db.execute(|conn| insert("biryani")(conn)).await.unwrap();

    assert!(db.check_connection().await);
    assert!(db.reconnect().await);
    assert!(db.check_connection().await);

    // same file, new pool
    assert_eq!(item_names(&db).await, vec!["biryani".to_string()]);
    assert_eq!(db.stats().await.max_connections, 2);
}

#[tokio::test]
async fn test_reconnect_does_not_wait_for_borrowed_connections() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    let old_pool = db.pool().await;
    let borrowed = old_pool.acquire().await.unwrap();

    let reconnected = timeout(Duration::from_secs(2), db.reconnect())
        .await
        .expect("reconnect should return while a connection is checked out");
    assert!(reconnected);

    // the old pool is shut down in the background
    timeout(Duration::from_secs(2), async {
        while !old_pool.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("old pool should be closed");

    db.execute(|conn| insert("jalebi")(conn)).await.unwrap();
    drop(borrowed);
    assert_eq!(item_names(&db).await, vec!["jalebi".to_string()]);
}

#[tokio::test]
async fn test_retry_recovers_after_pool_is_closed() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;
    db.execute(|conn| insert("kulfi")(conn)).await.unwrap();

    db.close().await;
    assert!(!db.check_connection().await);

    let count: i64 = db
        .execute_with_retry(
            |conn| {
                Box::pin(async move {
                    let value = sqlx::query_scalar("SELECT COUNT(*) FROM items").fetch_one(conn).await?;
                    Ok(value)
                })
            },
            2,
        )
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert!(db.check_connection().await);
}

#[tokio::test]
async fn test_unreachable_database_reports_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("missing").join("bmb.db").display());
    let config = DatabaseConfig { acquire_timeout_secs: 1, ..test_config() };

    let db = DatabaseManager::<Sqlite>::connect_lazy(&url, config).unwrap();

    assert!(!db.check_connection().await);
    assert!(!db.reconnect().await);

    let result: Result<i64, AppError> = db
        .execute(|conn| {
            Box::pin(async move {
                let value = sqlx::query_scalar("SELECT 1").fetch_one(conn).await?;
                Ok(value)
            })
        })
        .await;
    assert!(matches!(result, Err(AppError::DatabaseError(_))));
}

#[tokio::test]
async fn test_closed_manager_is_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let db = manager(&dir).await;

    db.close().await;
    assert!(!db.check_connection().await);
}
