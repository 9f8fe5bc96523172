//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::net::ConnectionTracker;
use crate::relay::{Relay, RelayActor, RelayHandle, RelaySettings};

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Handle to the relay actor that owns sessions and chat
    pub relay: RelayHandle,
    /// Per-IP connection admission
    pub connections: ConnectionTracker,
    /// Process start, for the uptime report
    pub started_at: Instant,
}

impl AppState {
    /// Create the application state and spawn the relay actor on the current
    /// runtime. The actor stops when `shutdown_tx` fires.
    pub fn new(config: ServerConfig, shutdown_tx: &broadcast::Sender<()>) -> (Self, JoinHandle<()>) {
        let settings = Self::create_relay_settings(&config);
        info!(
            max_players = settings.max_players,
            chat_history = settings.chat_history_capacity,
            spawn_radius = settings.spawn_radius,
            "Configuring relay"
        );

        let (relay, relay_task) = RelayActor::spawn(Relay::new(settings), shutdown_tx.subscribe());
        let connections = ConnectionTracker::new(config.max_connections_per_ip);

        let state = Self {
            config,
            relay,
            connections,
            started_at: Instant::now(),
        };

        (state, relay_task)
    }

    /// Time since the state was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Create relay settings from server config
    fn create_relay_settings(config: &ServerConfig) -> RelaySettings {
        RelaySettings {
            chat_history_capacity: config.chat_history_capacity,
            spawn_radius: config.spawn_radius,
            max_players: config.max_players,
        }
    }
}
