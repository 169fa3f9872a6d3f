use std::net::SocketAddr;
use std::sync::Arc;

use bite_me_buddy::{
    app::create_app,
    config::Settings,
    database::{create_database_if_not_exists, drop_database, init_database, DatabaseConfig, DatabaseManager},
    services::UserService,
    utils::init_logging,
    AppState,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    init_logging(&settings.logging)?;
    settings.validate()?;

    info!(environment = %settings.environment, "Starting Bite Me Buddy");

    if !settings.is_production() {
        create_database_if_not_exists(&settings.database.url).await?;
    }

    let db: Arc<DatabaseManager> = Arc::new(
        DatabaseManager::connect(&settings.database.url, DatabaseConfig::from_settings(&settings)).await?,
    );

    if std::env::args().any(|arg| arg == "--reset-database") {
        if settings.is_production() {
            return Err("--reset-database is refused in production".into());
        }
        drop_database(&db.pool().await).await?;
    }
    init_database(&db.pool().await).await?;

    UserService::new(db.clone())
        .ensure_admin(
            settings.auth.admin_username.as_deref(),
            settings.auth.admin_password.as_deref(),
        )
        .await?;

    tokio::fs::create_dir_all(&settings.storage.static_dir).await?;
    tokio::fs::create_dir_all(&settings.storage.uploads_dir).await?;

    let listener = tokio::net::TcpListener::bind((settings.api.host.as_str(), settings.api.port)).await?;
    info!("API server listening on {}", listener.local_addr()?);

    let app = create_app(AppState::new(db.clone(), settings));

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down Bite Me Buddy");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
