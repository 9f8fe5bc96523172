//! Listener loop for browser connections

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::error::{NetworkError, RelayError};
use crate::net::handler::ConnectionHandler;
use crate::AppState;

/// Accept incoming WebSocket connections until shutdown
pub async fn accept_websocket_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            match handler.handle_websocket(stream, addr).await {
                                Ok(()) => {}
                                // Expected when a peer drops or idles out
                                Err(RelayError::Network(
                                    NetworkError::ConnectionClosed | NetworkError::Timeout,
                                )) => {
                                    info!("WebSocket connection from {} closed", addr);
                                }
                                Err(e) => {
                                    warn!("WebSocket connection error from {}: {}", addr, e);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("WebSocket connection acceptor shutting down");
                break;
            }
        }
    }
}
