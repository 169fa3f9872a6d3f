use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{require_admin, CurrentUser},
    database::{health_check, DatabaseHealthStatus},
    error::AppError,
    models::{
        AssignOrder, CreateService, Order, OrderStats, PriceUpdate, RegisterUser, Service,
        UpdateOrderStatus, User, UserListQuery,
    },
    services::{CatalogService, OrderService, UserService},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct BulkCreateServicesRequest {
    pub services: Vec<CreateService>,
}

#[derive(Debug, Deserialize)]
pub struct BulkPriceUpdateRequest {
    pub updates: Vec<PriceUpdate>,
}

#[derive(Debug, Serialize)]
pub struct BulkServicesResponse {
    pub count: usize,
    pub services: Vec<Service>,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<OrderStats>, AppError> {
    let stats = OrderService::new(state.db.clone()).stats().await?;
    Ok(Json(stats))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = UserService::new(state.db.clone()).list_users(query.role).await?;
    Ok(Json(users))
}

pub async fn create_team_member(
    State(state): State<AppState>,
    Json(registration): Json<RegisterUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = UserService::new(state.db.clone())
        .create_team_member(registration)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn assign_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<AssignOrder>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.db.clone())
        .assign_order(order_id, request.team_member_id)
        .await?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatus>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.db.clone())
        .update_status(context.actor()?, order_id, request.status)
        .await?;
    Ok(Json(order))
}

pub async fn bulk_create_services(
    State(state): State<AppState>,
    Json(request): Json<BulkCreateServicesRequest>,
) -> Result<(StatusCode, Json<BulkServicesResponse>), AppError> {
    let services = CatalogService::new(state.db.clone())
        .bulk_create(request.services)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BulkServicesResponse { count: services.len(), services }),
    ))
}

pub async fn bulk_update_prices(
    State(state): State<AppState>,
    Json(request): Json<BulkPriceUpdateRequest>,
) -> Result<Json<BulkServicesResponse>, AppError> {
    let services = CatalogService::new(state.db.clone())
        .bulk_update_prices(request.updates)
        .await?;
    Ok(Json(BulkServicesResponse { count: services.len(), services }))
}

/// Version, latency and pool usage of the database.
pub async fn database_status(State(state): State<AppState>) -> Result<Json<DatabaseHealthStatus>, AppError> {
    let pool = state.db.pool().await;
    Ok(Json(health_check(&pool).await?))
}

pub fn create_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/users", get(list_users))
        .route("/team-members", post(create_team_member))
        .route("/orders/:order_id/assign", put(assign_order))
        .route("/orders/:order_id/status", put(update_order_status))
        .route("/services/bulk", post(bulk_create_services))
        .route("/services/prices", put(bulk_update_prices))
        .route("/database", get(database_status))
        .route_layer(middleware::from_fn(require_admin))
}
