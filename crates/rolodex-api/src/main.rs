mod config;
mod directory;
mod error;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use rolodex_core::{DatabaseService, SyncEngine};
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env only in debug builds
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolodex_api=info,rolodex_core=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting rolodex-api with config: {:?}", config);

    let store = DatabaseService::open_path(&config.core.db_path).await?;
    let engine = SyncEngine::from_config(store, &config.core)?;
    let state = AppState::new(config.clone(), engine);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("rolodex-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
