use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{CreateService, Service, ServiceListQuery, UpdateService, UserRole},
    services::CatalogService,
    AppState,
};

/// Public menu. Unavailable services are listed only for admins who ask.
pub async fn list_services(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Vec<Service>>, AppError> {
    let is_admin = user.map(|CurrentUser(context)| context.is_admin()).unwrap_or(false);
    let services = CatalogService::new(state.db.clone())
        .list_services(query.category, query.include_unavailable && is_admin)
        .await?;
    Ok(Json(services))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Service>, AppError> {
    let service = CatalogService::new(state.db.clone()).get_service(service_id).await?;
    Ok(Json(service))
}

pub async fn create_service(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Json(create): Json<CreateService>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    context.require_role(&[UserRole::Admin])?;
    let service = CatalogService::new(state.db.clone()).create_service(create).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(service_id): Path<Uuid>,
    Json(update): Json<UpdateService>,
) -> Result<Json<Service>, AppError> {
    context.require_role(&[UserRole::Admin])?;
    let service = CatalogService::new(state.db.clone())
        .update_service(service_id, update)
        .await?;
    Ok(Json(service))
}

pub async fn delete_service(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(service_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    context.require_role(&[UserRole::Admin])?;
    CatalogService::new(state.db.clone()).delete_service(service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_service_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route(
            "/:service_id",
            get(get_service).put(update_service).delete(delete_service),
        )
}
