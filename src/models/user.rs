use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,50}$").expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex"));

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Who a user is to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    TeamMember,
    Customer,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::TeamMember => "team_member",
            UserRole::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sign-up payload; also used by admins creating team members.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub password: String,
}

impl RegisterUser {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_full_name(&self.full_name)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.is_none() && self.full_name.is_none() && self.phone.is_none() {
            return Err(AppError::ValidationError("No profile fields to update".to_string()));
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(full_name) = &self.full_name {
            validate_full_name(full_name)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AppError::ValidationError(
            "Username must be 3-50 letters, digits or underscores".to_string(),
        ))
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() <= 255 && EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::ValidationError("Invalid email address".to_string()))
    }
}

fn validate_full_name(full_name: &str) -> Result<(), AppError> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 120 {
        return Err(AppError::ValidationError("Full name must be 1-120 characters".to_string()));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(AppError::ValidationError("Invalid phone number".to_string()))
    }
}
