//! Main Entrypoint for the Vaani Voice Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the upstream connector and the session manager.
//! 3. Spawning the session expiry sweep.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use vaani_api::{
    config::Config, router::create_router, session::SessionManager, state::AppState,
    ws::upstream::WsUpstreamConnector,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize the Session Manager ---
    let connector = Arc::new(WsUpstreamConnector::new(config.upstream_ws_url.clone()));
    let ttl = chrono::Duration::from_std(config.session_ttl)
        .context("SESSION_TTL_SECS out of range")?;
    let sessions = Arc::new(SessionManager::with_ttl(connector, ttl));

    // --- 4. Spawn the Expiry Sweep ---
    tokio::spawn(sessions.clone().run_expiry_sweep(config.sweep_interval));

    let app_state = Arc::new(AppState {
        sessions,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        upstream = %config.upstream_ws_url,
        bind_address = %config.bind_address,
        session_ttl_secs = config.session_ttl.as_secs(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
