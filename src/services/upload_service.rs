use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::AppError;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub url: String,
    pub file_name: String,
    pub size: usize,
}

/// Writes menu images under the uploads directory served at `/uploads`.
pub struct UploadService {
    uploads_dir: PathBuf,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(uploads_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            max_bytes,
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.uploads_dir, settings.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn store_image(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<StoredUpload, AppError> {
        let extension = image_extension(original_name)?;

        if bytes.is_empty() {
            return Err(AppError::UploadError("Uploaded file is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} byte limit",
                self.max_bytes
            )));
        }

        fs::create_dir_all(&self.uploads_dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(self.uploads_dir.join(&file_name), bytes).await?;

        info!(file = %file_name, size = bytes.len(), "Stored upload");
        Ok(StoredUpload {
            url: format!("/uploads/{}", file_name),
            file_name,
            size: bytes.len(),
        })
    }
}

fn image_extension(original_name: Option<&str>) -> Result<String, AppError> {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AppError::UploadError("File name has no extension".to_string()))?;

    if ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::UploadError(format!(
            "Unsupported file type .{}; allowed: {}",
            extension,
            ALLOWED_IMAGE_EXTENSIONS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stores_image_under_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadService::new(dir.path().join("uploads"), 1024);

        let stored = uploads.store_image(Some("Dosa.JPG"), b"fake-jpeg").await.unwrap();

        assert!(stored.url.starts_with("/uploads/"));
        assert!(stored.file_name.ends_with(".jpg"));
        let written = std::fs::read(dir.path().join("uploads").join(&stored.file_name)).unwrap();
        assert_eq!(written, b"fake-jpeg");
    }

    #[tokio::test]
    async fn test_rejects_other_file_types() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadService::new(dir.path(), 1024);

        assert!(matches!(
            uploads.store_image(Some("menu.pdf"), b"%PDF").await,
            Err(AppError::UploadError(_))
        ));
        assert!(matches!(
            uploads.store_image(None, b"data").await,
            Err(AppError::UploadError(_))
        ));
    }

    #[tokio::test]
    async fn test_enforces_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadService::new(dir.path(), 4);

        assert!(matches!(
            uploads.store_image(Some("big.png"), b"12345").await,
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            uploads.store_image(Some("empty.png"), b"").await,
            Err(AppError::UploadError(_))
        ));
    }
}
