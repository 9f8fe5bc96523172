//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name used in startup logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address both listeners bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP port (status and health endpoints)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// WebSocket port for browser clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Maximum number of concurrently connected players
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Maximum concurrent connections from one IP address
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    /// Number of chat messages replayed to new players
    #[serde(default = "default_chat_history_capacity")]
    pub chat_history_capacity: usize,

    /// Half-width of the square around the origin players spawn in
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f64,

    /// Seconds without any frame before a connection is dropped (0 to disable)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Per-connection outbound event queue length
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,

    /// Largest accepted WebSocket message in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

// Default value functions
fn default_server_name() -> String {
    "MMO Relay".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_http_port() -> u16 {
    3000
}

fn default_websocket_port() -> u16 {
    3001
}

fn default_max_players() -> usize {
    500
}

fn default_max_connections_per_ip() -> usize {
    10
}

fn default_chat_history_capacity() -> usize {
    50
}

fn default_spawn_radius() -> f64 {
    2.0
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

fn default_outbound_queue_size() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            websocket_port: default_websocket_port(),
            max_players: default_max_players(),
            max_connections_per_ip: default_max_connections_per_ip(),
            chat_history_capacity: default_chat_history_capacity(),
            spawn_radius: default_spawn_radius(),
            idle_timeout_secs: default_idle_timeout(),
            outbound_queue_size: default_outbound_queue_size(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("MMO_RELAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML text; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MMO_RELAY_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("MMO_RELAY_BIND_ADDRESS") {
            if let Ok(addr) = val.parse() {
                self.bind_address = addr;
            }
        }
        // PORT is honoured for compatibility with common hosting platforms;
        // the prefixed variable wins when both are set.
        if let Ok(val) = env::var("PORT") {
            if let Ok(port) = val.parse() {
                self.http_port = port;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                self.http_port = port;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_WEBSOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.websocket_port = port;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_MAX_PLAYERS") {
            if let Ok(max) = val.parse() {
                self.max_players = max;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_MAX_PER_IP") {
            if let Ok(max) = val.parse() {
                self.max_connections_per_ip = max;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_CHAT_HISTORY") {
            if let Ok(capacity) = val.parse() {
                self.chat_history_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("MMO_RELAY_IDLE_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.idle_timeout_secs = secs;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http_port == self.websocket_port && self.http_port != 0 {
            anyhow::bail!("HTTP port and WebSocket port must be different");
        }

        if self.max_players == 0 || self.max_players > 10000 {
            anyhow::bail!("Max players must be between 1 and 10000");
        }

        if self.max_connections_per_ip == 0 {
            anyhow::bail!("Max connections per IP must be at least 1");
        }

        if self.chat_history_capacity == 0 {
            anyhow::bail!("Chat history capacity must be at least 1");
        }

        if !self.spawn_radius.is_finite() || self.spawn_radius < 0.0 {
            anyhow::bail!("Spawn radius must be a finite, non-negative number");
        }

        if self.outbound_queue_size == 0 {
            anyhow::bail!("Outbound queue size must be at least 1");
        }

        if self.max_message_size < 1024 {
            anyhow::bail!("Max message size must be at least 1024 bytes");
        }

        Ok(())
    }

    /// Idle timeout, or `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// How often the server pings each client so a quiet but live peer
    /// still produces traffic inside the idle window
    pub fn ping_interval(&self) -> Option<Duration> {
        self.idle_timeout()
            .map(|idle| (idle / 3).max(Duration::from_millis(100)))
    }
}
