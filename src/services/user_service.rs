use std::sync::Arc;

use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::database::DatabaseManager;
use crate::error::AppError;
use crate::models::{RegisterUser, UpdateProfile, User, UserRole};

/// Accounts: sign-up, login checks, profiles and the bootstrap admin.
pub struct UserService {
    db: Arc<DatabaseManager>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    pub async fn register_customer(&self, registration: RegisterUser) -> Result<User, AppError> {
        self.create_user(registration, UserRole::Customer).await
    }

    pub async fn create_team_member(&self, registration: RegisterUser) -> Result<User, AppError> {
        self.create_user(registration, UserRole::TeamMember).await
    }

    async fn create_user(&self, registration: RegisterUser, role: UserRole) -> Result<User, AppError> {
        registration.validate()?;

        let id = Uuid::new_v4();
        let password_hash = hash_password(&registration.password);

        let user = self
            .db
            .execute(move |conn| {
                let registration = registration.clone();
                let password_hash = password_hash.clone();
                Box::pin(async move {
                    sqlx::query_as::<_, User>(
                        r#"
                        INSERT INTO users (id, username, email, full_name, phone, password_hash, role)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        RETURNING *
                        "#,
                    )
                    .bind(id)
                    .bind(registration.username.trim())
                    .bind(registration.email.trim().to_lowercase())
                    .bind(registration.full_name.trim())
                    .bind(registration.phone.as_deref())
                    .bind(password_hash)
                    .bind(role)
                    .fetch_one(conn)
                    .await
                    .map_err(|e| match AppError::from(e) {
                        AppError::Conflict(_) => {
                            AppError::Conflict("Username or email is already registered".to_string())
                        }
                        other => other,
                    })
                })
            })
            .await?;

        info!(user_id = %user.id, role = user.role.as_str(), "Created user {}", user.username);
        Ok(user)
    }

    /// Check credentials; unknown users and wrong passwords look the same.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let username = username.trim().to_string();
        let user = self
            .db
            .execute(move |conn| {
                let username = username.clone();
                Box::pin(async move {
                    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                        .bind(username)
                        .fetch_optional(conn)
                        .await?;
                    Ok(user)
                })
            })
            .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                return Err(AppError::AuthenticationError("Invalid username or password".to_string()));
            }
        };

        if !user.is_active {
            return Err(AppError::AuthorizationError("Account is disabled".to_string()));
        }
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.db.execute(move |conn| Box::pin(fetch_user(conn, id))).await
    }

    pub async fn update_profile(&self, id: Uuid, update: UpdateProfile) -> Result<User, AppError> {
        update.validate()?;

        self.db
            .execute(move |conn| {
                let update = update.clone();
                Box::pin(async move {
                    sqlx::query_as::<_, User>(
                        r#"
                        UPDATE users
                        SET email = COALESCE($2, email),
                            full_name = COALESCE($3, full_name),
                            phone = COALESCE($4, phone),
                            updated_at = NOW()
                        WHERE id = $1
                        RETURNING *
                        "#,
                    )
                    .bind(id)
                    .bind(update.email.map(|email| email.trim().to_lowercase()))
                    .bind(update.full_name.map(|name| name.trim().to_string()))
                    .bind(update.phone)
                    .fetch_optional(conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
                })
            })
            .await
    }

    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, AppError> {
        self.db
            .execute(move |conn| {
                Box::pin(async move {
                    let users = sqlx::query_as::<_, User>(
                        r#"
                        SELECT * FROM users
                        WHERE ($1::user_role IS NULL OR role = $1)
                        ORDER BY created_at DESC
                        "#,
                    )
                    .bind(role)
                    .fetch_all(conn)
                    .await?;
                    Ok(users)
                })
            })
            .await
    }

    /// Load an active team member, for order assignment.
    pub async fn get_team_member(&self, id: Uuid) -> Result<User, AppError> {
        let user = self.get_user(id).await?;
        if user.role != UserRole::TeamMember || !user.is_active {
            return Err(AppError::ValidationError(format!("User {} is not an active team member", id)));
        }
        Ok(user)
    }

    /// Create the configured admin account unless an admin already exists.
    pub async fn ensure_admin(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let admin_count: i64 = self
            .db
            .execute(|conn| {
                Box::pin(async move {
                    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                        .fetch_one(conn)
                        .await?;
                    Ok(count)
                })
            })
            .await?;

        if admin_count > 0 {
            return Ok(None);
        }

        let (Some(username), Some(password)) = (username, password) else {
            warn!("No admin account exists and ADMIN_USERNAME/ADMIN_PASSWORD are not set");
            return Ok(None);
        };

        let admin = self
            .create_user(
                RegisterUser {
                    username: username.to_string(),
                    email: format!("{}@bitemebuddy.local", username),
                    full_name: "Administrator".to_string(),
                    phone: None,
                    password: password.to_string(),
                },
                UserRole::Admin,
            )
            .await?;

        info!("Bootstrap admin account {} created", admin.username);
        Ok(Some(admin))
    }
}

async fn fetch_user(conn: &mut PgConnection, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}
