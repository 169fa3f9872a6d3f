//! Bearer-token middleware, role guards and the `CurrentUser` extractor

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::auth::claims::{AuthContext, TokenValidation};
use crate::auth::jwt::JwtService;
use crate::error::AppError;
use crate::models::UserRole;

/// Why a presented token was not accepted; read by the guards.
#[derive(Debug, Clone)]
struct RejectedToken(&'static str);

/// Attach an [`AuthContext`] when a valid bearer token is present.
///
/// Never rejects by itself, so public routes behind it keep working; the
/// guards and [`CurrentUser`] decide whether authentication is required.
pub async fn optional_auth(
    State(jwt_service): State<Arc<JwtService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(JwtService::extract_token_from_header)
        .map(str::to_string);

    if let Some(token) = token {
        match jwt_service.validate_token(&token).await {
            TokenValidation::Valid(claims) => {
                request.extensions_mut().insert(AuthContext::new(claims, token));
            }
            TokenValidation::Expired => {
                request.extensions_mut().insert(RejectedToken("Token has expired"));
            }
            TokenValidation::Revoked => {
                request.extensions_mut().insert(RejectedToken("Token has been revoked"));
            }
            TokenValidation::Invalid(reason) => {
                tracing::debug!("Rejected bearer token: {}", reason);
                request.extensions_mut().insert(RejectedToken("Invalid token"));
            }
        }
    }

    next.run(request).await
}

pub async fn require_auth(request: Request, next: Next) -> Result<Response, AppError> {
    auth_context(request.extensions())?;
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    auth_context(request.extensions())?.require_role(&[UserRole::Admin])?;
    Ok(next.run(request).await)
}

pub async fn require_team_member(request: Request, next: Next) -> Result<Response, AppError> {
    auth_context(request.extensions())?.require_role(&[UserRole::TeamMember])?;
    Ok(next.run(request).await)
}

pub async fn require_customer(request: Request, next: Next) -> Result<Response, AppError> {
    auth_context(request.extensions())?.require_role(&[UserRole::Customer])?;
    Ok(next.run(request).await)
}

fn auth_context(extensions: &axum::http::Extensions) -> Result<&AuthContext, AppError> {
    if let Some(context) = extensions.get::<AuthContext>() {
        return Ok(context);
    }
    let reason = extensions
        .get::<RejectedToken>()
        .map(|rejected| rejected.0)
        .unwrap_or("Not authenticated");
    Err(AppError::AuthenticationError(reason.to_string()))
}

/// The authenticated caller. Use `Option<CurrentUser>` on public routes.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_context(&parts.extensions).cloned().map(CurrentUser)
    }
}
