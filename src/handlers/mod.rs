pub mod admin_handlers;
pub mod auth_handlers;
pub mod customer_handlers;
pub mod health;
pub mod order_handlers;
pub mod pages;
pub mod service_handlers;
pub mod team_handlers;
pub mod upload_handlers;

pub use admin_handlers::create_admin_routes;
pub use auth_handlers::create_auth_routes;
pub use customer_handlers::create_customer_routes;
pub use health::health_check;
pub use order_handlers::create_order_routes;
pub use service_handlers::create_service_routes;
pub use team_handlers::create_team_routes;
pub use upload_handlers::create_upload_routes;
