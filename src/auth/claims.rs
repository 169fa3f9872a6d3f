//! JWT claims and the per-request authentication context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UserRole;

pub const TOKEN_ISSUER: &str = "bite-me-buddy";
pub const TOKEN_AUDIENCE: &str = "bite-me-buddy-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (UUID)
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expires at (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Token ID, the handle used for revocation
    pub jti: String,
}

impl Claims {
    pub fn new(user_id: Uuid, username: String, role: UserRole, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        let exp = now + chrono::Duration::hours(expires_in_hours);

        Self {
            sub: user_id.to_string(),
            username,
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthenticationError("Malformed token subject".to_string()))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug)]
pub enum TokenValidation {
    Valid(Claims),
    Expired,
    Invalid(String),
    Revoked,
}

/// Inserted into request extensions once a bearer token checks out.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn new(claims: Claims, token: String) -> Self {
        Self {
            claims,
            token,
            authenticated_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.claims.user_id()
    }

    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    pub fn is_admin(&self) -> bool {
        self.claims.role.is_admin()
    }

    pub fn actor(&self) -> Result<Actor, AppError> {
        Ok(Actor {
            id: self.user_id()?,
            role: self.claims.role,
        })
    }

    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.claims.role) {
            Ok(())
        } else {
            Err(AppError::AuthorizationError(format!(
                "Role {} may not access this resource",
                self.claims.role.as_str()
            )))
        }
    }
}

/// The identity a service call is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}
