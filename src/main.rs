//! MMO Relay Server
//!
//! Relays player movement and chat between browser clients over WebSocket
//! and serves a small HTTP status API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mmo_relay::api;
use mmo_relay::config::ServerConfig;
use mmo_relay::net::accept_websocket_connections;
use mmo_relay::state::AppState;
use mmo_relay::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before anything reads the environment
    dotenv::dotenv().ok();

    init_logging();

    info!("MMO Relay Server v{}", VERSION);

    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (state, relay_task) = AppState::new(config.clone(), &shutdown_tx);
    let state = Arc::new(state);
    info!("Application state initialized");

    // Start WebSocket listener for browser clients
    let ws_addr = SocketAddr::new(config.bind_address, config.websocket_port);
    let ws_listener = TcpListener::bind(ws_addr).await?;
    info!("WebSocket server listening on: {}", ws_addr);

    // Start HTTP listener for the status API
    let http_addr = SocketAddr::new(config.bind_address, config.http_port);
    let http_listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on: {}", http_addr);

    let ws_handle = tokio::spawn(accept_websocket_connections(
        ws_listener,
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    let http_state = state.clone();
    let http_shutdown_rx = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        run_http_server(http_listener, http_state, http_shutdown_rx).await;
    });

    info!("{} startup complete!", config.server_name);

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    let _ = ws_handle.await;
    let _ = http_handle.await;
    let _ = relay_task.await;

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mmo_relay=debug"));

    let json = std::env::var("MMO_RELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_level(true)
            .init();
    }
}

/// Run the HTTP API server
async fn run_http_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let router = api::create_router(state);

    let shutdown_signal = async move {
        let _ = shutdown_rx.recv().await;
        info!("HTTP server shutting down");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap_or_else(|e| error!("HTTP server error: {}", e));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
