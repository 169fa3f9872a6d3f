use axum::{middleware, routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::optional_auth;
use crate::config::Settings;
use crate::handlers::{
    create_admin_routes, create_auth_routes, create_customer_routes, create_order_routes,
    create_service_routes, create_team_routes, create_upload_routes, health_check, pages,
};
use crate::middleware::{cors_layer, log_requests, panic_response, render_error_pages, security_headers};
use crate::AppState;

/// Routes, static mounts and authentication, without the outer HTTP layers.
pub fn build_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .route("/", get(pages::home))
        .route("/admin-login", get(pages::admin_login))
        .route("/health", get(health_check))
        .nest("/api/auth", create_auth_routes())
        .nest("/api/customer", create_customer_routes())
        .nest("/api/team", create_team_routes())
        .nest("/api/admin", create_admin_routes())
        .nest("/api/orders", create_order_routes())
        .nest("/api/services", create_service_routes())
        .nest("/api/uploads", create_upload_routes(settings.storage.max_upload_bytes))
        .nest_service("/static", ServeDir::new(&settings.storage.static_dir))
        .nest_service("/uploads", ServeDir::new(&settings.storage.uploads_dir))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.jwt_service.clone(), optional_auth))
        .with_state(state)
}

/// Wrap the router in CORS, security headers, logging and panic recovery.
pub fn with_middleware(router: Router, settings: &Settings) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(render_error_pages))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(&settings.api.cors_origins))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
}

pub fn create_app(state: AppState) -> Router {
    let settings = state.settings.clone();
    with_middleware(build_router(state), &settings)
}
