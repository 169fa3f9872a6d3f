pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::auth::{JwtConfig, JwtService};
use crate::config::Settings;
use crate::database::DatabaseManager;

pub use error::types::*;

/// Shared by every handler; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub settings: Arc<Settings>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(db: Arc<DatabaseManager>, settings: Settings) -> Self {
        let jwt_service = JwtService::new(JwtConfig::from_settings(&settings.auth));
        Self {
            db,
            settings: Arc::new(settings),
            jwt_service: Arc::new(jwt_service),
        }
    }
}
