use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::{require_auth, CurrentUser},
    error::AppError,
    models::{Order, OrderListQuery, OrderStatusHistory, OrderWithItems, PlaceOrder},
    services::OrderService,
    AppState,
};

pub async fn place_order(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderWithItems>), AppError> {
    let order = OrderService::new(state.db.clone())
        .place_order(context.user_id()?, request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.db.clone())
        .list_orders(context.actor()?, query.status)
        .await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderWithItems>, AppError> {
    let order = OrderService::new(state.db.clone())
        .get_order(context.actor()?, order_id)
        .await?;
    Ok(Json(order))
}

pub async fn get_order_history(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<OrderStatusHistory>>, AppError> {
    let history = OrderService::new(state.db.clone())
        .get_history(context.actor()?, order_id)
        .await?;
    Ok(Json(history))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.db.clone())
        .cancel_order(context.actor()?, order_id)
        .await?;
    Ok(Json(order))
}

pub fn create_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:order_id", get(get_order))
        .route("/:order_id/history", get(get_order_history))
        .route("/:order_id/cancel", post(cancel_order))
        .route_layer(middleware::from_fn(require_auth))
}
