use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::error;

use crate::database::test_connection;
use crate::utils::get_ist_time;
use crate::AppState;

/// Liveness plus a `SELECT 1` round trip to the database.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let pool = state.db.pool().await;

    match test_connection(&pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": get_ist_time().to_rfc3339(),
                "database": "connected",
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "detail": "Service unavailable",
                    "timestamp": get_ist_time().to_rfc3339(),
                    "database": "disconnected",
                })),
            )
        }
    }
}
