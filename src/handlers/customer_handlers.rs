use axum::{
    extract::{Query, State},
    middleware,
    response::Json,
    routing::get,
    Router,
};

use crate::{
    auth::{require_customer, CurrentUser},
    error::AppError,
    models::{Order, OrderListQuery, UpdateProfile, User},
    services::{OrderService, UserService},
    AppState,
};

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone()).get_user(context.user_id()?).await?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Json(update): Json<UpdateProfile>,
) -> Result<Json<User>, AppError> {
    let user = UserService::new(state.db.clone())
        .update_profile(context.user_id()?, update)
        .await?;
    Ok(Json(user))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.db.clone())
        .list_orders(context.actor()?, query.status)
        .await?;
    Ok(Json(orders))
}

pub fn create_customer_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/orders", get(list_my_orders))
        .route_layer(middleware::from_fn(require_customer))
}
