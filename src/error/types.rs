use std::fmt;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use sqlx::error::ErrorKind;
use tracing::error;

#[derive(Debug, Clone)]
pub enum AppError {
    DatabaseError(String),
    ValidationError(String),
    NotFound(String),
    Conflict(String),
    AuthenticationError(String),
    AuthorizationError(String),
    ConfigError(String),
    UploadError(String),
    PayloadTooLarge(String),
    InternalError(String),
}

impl AppError {
    /// Machine-readable code sent to clients next to the human message.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AuthenticationError(_) => "AUTHENTICATION_ERROR",
            AppError::AuthorizationError(_) => "AUTHORIZATION_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::UploadError(_) => "UPLOAD_ERROR",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::UploadError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DatabaseError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures raised by the database layer itself.
    pub fn is_database_error(&self) -> bool {
        matches!(self, AppError::DatabaseError(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::AuthorizationError(msg) => write!(f, "Authorization error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::UploadError(msg) => write!(f, "Upload error: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::DatabaseError(msg) => {
                error!("Database error while handling request: {}", msg);
                "Service temporarily unavailable".to_string()
            }
            AppError::ConfigError(msg) | AppError::InternalError(msg) => {
                error!("Internal server error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::UploadError(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
        };

        let body = Json(json!({
            "detail": detail,
            "error_code": self.error_code(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => AppError::Conflict(db_err.message().to_string()),
                ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => AppError::ValidationError(db_err.message().to_string()),
                _ => AppError::DatabaseError(err.to_string()),
            },
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(format!("Migration failed: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(format!("I/O error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AuthenticationError("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AuthorizationError("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::DatabaseError("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::InternalError("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!err.is_database_error());
    }

    #[test]
    fn test_pool_timeout_is_database_error() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_database_error());
    }

    #[tokio::test]
    async fn test_response_body_carries_detail_and_code() {
        let response = AppError::Conflict("Username already taken".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "Username already taken");
        assert_eq!(body["error_code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_database_details_are_not_leaked() {
        let response = AppError::DatabaseError("password authentication failed for user".to_string()).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "Service temporarily unavailable");
    }
}
