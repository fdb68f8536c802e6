use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vaccination_portal::auth::TokenService;
use vaccination_portal::config::config;
use vaccination_portal::database::open_store;
use vaccination_portal::{app, is_production, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, JWT_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = config().clone();
    config.validate().map_err(anyhow::Error::msg)?;
    info!("Starting Vaccination Portal API in {:?} mode", config.environment);
    if is_production!() && config.security.open_registration {
        warn!("Open registration is enabled in production");
    }

    let store = open_store(&config.database).await.context("failed to open record store")?;
    let tokens = TokenService::from_config(&config.security).context("failed to initialise token service")?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(Arc::clone(&store), tokens, config);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Vaccination Portal API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
