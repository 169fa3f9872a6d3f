use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::post,
    Router,
};

use crate::{
    auth::require_admin,
    error::AppError,
    services::{StoredUpload, UploadService},
    AppState,
};

/// Multipart framing allowance on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Store the `file` field of a multipart form as a menu image.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredUpload>), AppError> {
    let uploads = UploadService::from_settings(&state.settings.storage);

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let stored = uploads.store_image(file_name.as_deref(), &bytes).await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(AppError::UploadError("Multipart field 'file' is missing".to_string()))
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(error.body_text())
    } else {
        AppError::UploadError(error.body_text())
    }
}

pub fn create_upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(upload_image))
        .route_layer(middleware::from_fn(require_admin))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES))
}
