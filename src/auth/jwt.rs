//! JWT issuing, validation and revocation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenValidation, TOKEN_AUDIENCE, TOKEN_ISSUER};
use crate::config::AuthSettings;
use crate::error::AppError;
use crate::models::{User, UserRole};

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    expires_in_hours: i64,
    /// Revoked token IDs with their expiry, so stale entries can be pruned.
    revoked_tokens: Arc<RwLock<HashMap<String, i64>>>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub expires_in_hours: i64,
}

impl JwtConfig {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            algorithm: Algorithm::HS256,
            expires_in_hours: settings.jwt_expires_in_hours,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from_settings(&AuthSettings::default())
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm: config.algorithm,
            expires_in_hours: config.expires_in_hours,
            revoked_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        username: String,
        role: UserRole,
        expires_in_hours: Option<i64>,
    ) -> Result<(String, Claims), AppError> {
        let claims = Claims::new(
            user_id,
            username,
            role,
            expires_in_hours.unwrap_or(self.expires_in_hours),
        );

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to generate token: {}", e)))?;

        Ok((token, claims))
    }

    pub async fn validate_token(&self, token: &str) -> TokenValidation {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.leeway = 0;

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => return TokenValidation::Expired,
            Err(e) => return TokenValidation::Invalid(e.to_string()),
        };

        if self.revoked_tokens.read().await.contains_key(&claims.jti) {
            return TokenValidation::Revoked;
        }
        if claims.is_expired() {
            return TokenValidation::Expired;
        }

        TokenValidation::Valid(claims)
    }

    pub async fn revoke(&self, claims: &Claims) {
        self.revoked_tokens
            .write()
            .await
            .insert(claims.jti.clone(), claims.exp);
        debug!(jti = %claims.jti, "Token revoked");
    }

    /// Forget revocations for tokens that have expired anyway.
    pub async fn prune_revoked_tokens(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked_tokens.write().await;
        let before = revoked.len();
        revoked.retain(|_, exp| *exp > now);
        before - revoked.len()
    }

    pub fn login_response(&self, token: String, claims: &Claims, user: &User) -> LoginResponse {
        LoginResponse {
            access_token: token,
            token_type: "bearer",
            expires_at: claims.exp,
            user: UserInfo {
                id: user.id.to_string(),
                username: user.username.clone(),
                role: user.role,
            },
        }
    }

    pub fn extract_token_from_header(auth_header: &str) -> Option<&str> {
        auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
