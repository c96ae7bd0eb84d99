use anyhow::Context;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::routes::{app, AppState};

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = config().clone();
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!("Starting in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;
    if let Err(e) = DatabaseManager::health_check(&pool).await {
        tracing::warn!("Database not reachable at start-up: {}", e);
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    let state = AppState::new(pool, config);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
