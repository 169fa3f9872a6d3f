use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{CurrentUser, LoginResponse},
    error::AppError,
    models::{LoginRequest, RegisterUser, User},
    services::UserService,
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<RegisterUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user_service = UserService::new(state.db.clone());
    let user = user_service.register_customer(registration).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user_service = UserService::new(state.db.clone());
    let user = user_service.authenticate(&request.username, &request.password).await?;

    let (token, claims) = state
        .jwt_service
        .generate_token(user.id, user.username.clone(), user.role, None)?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(state.jwt_service.login_response(token, &claims, &user)))
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
) -> Json<Value> {
    state.jwt_service.revoke(&context.claims).await;
    Json(json!({ "message": "Logged out" }))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(context): CurrentUser,
) -> Result<Json<User>, AppError> {
    let user_service = UserService::new(state.db.clone());
    let user = user_service.get_user(context.user_id()?).await?;
    Ok(Json(user))
}

pub fn create_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
