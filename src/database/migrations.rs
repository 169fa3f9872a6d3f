use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::{PgPool, Postgres};
use tracing::{error, info, warn};

use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Initialize database with tables and indexes
pub async fn init_database(pool: &PgPool) -> Result<(), AppError> {
    info!("Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        error!("Database initialization failed: {}", e);
        AppError::from(e)
    })?;

    info!("Database initialized successfully");
    Ok(())
}

/// Drop all database tables by reverting every migration
pub async fn drop_database(pool: &PgPool) -> Result<(), AppError> {
    warn!("Reverting all database migrations");

    MIGRATOR.undo(pool, 0).await.map_err(|e| {
        error!("Database drop failed: {}", e);
        AppError::from(e)
    })?;

    info!("Database dropped successfully");
    Ok(())
}

pub async fn create_database_if_not_exists(database_url: &str) -> Result<(), AppError> {
    let exists = Postgres::database_exists(database_url)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to check database existence: {}", e)))?;

    if exists {
        info!("Database already exists");
    } else {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create database: {}", e)))?;
        info!("Database created successfully");
    }

    Ok(())
}
