//! MMO Relay Server Library
//!
//! This library provides the session and chat relay behind the browser
//! MMO client: clients report their transform and chat over WebSocket, and
//! the relay keeps the last known state of every player and rebroadcasts it.
//!
//! ## Modules
//!
//! - `api` - HTTP status endpoint and static client files
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `net` - WebSocket transport, admission and connection handling
//! - `protocol` - JSON event envelopes
//! - `relay` - Session registry, chat history and the relay actor

pub mod api;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod relay;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RelayError, Result};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
