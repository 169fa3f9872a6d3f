use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

use crate::{
    auth::{require_team_member, CurrentUser},
    error::AppError,
    models::{Order, OrderListQuery, UpdateOrderStatus},
    services::OrderService,
    AppState,
};

pub async fn list_assigned_orders(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.db.clone())
        .list_orders(context.actor()?, query.status)
        .await?;
    Ok(Json(orders))
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

pub fn create_team_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_assigned_orders))
        .route("/orders/:order_id/status", put(update_order_status))
        .route_layer(middleware::from_fn(require_team_member))
}
