//! Trolley API - e-mails share notifications on behalf of signed-in users

mod auth;
mod config;
mod error;
mod mail;
mod rate_limit;
mod routes;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use config::AppConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production injects the environment.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trolley_api=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting trolley-api with config: {:?}", config);

    let state = AppState::from_config(Arc::clone(&config))?;
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("trolley-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
