pub mod catalog_service;
pub mod order_service;
pub mod upload_service;
pub mod user_service;

pub use catalog_service::CatalogService;
pub use order_service::OrderService;
pub use upload_service::{StoredUpload, UploadService, ALLOWED_IMAGE_EXTENSIONS};
pub use user_service::UserService;
