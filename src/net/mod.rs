//! Networking module
//!
//! This module handles all network-related functionality for the relay:
//! - WebSocket upgrade and framing for browser clients
//! - Per-IP connection admission
//! - Connection lifecycle and the accept loop

pub mod acceptor;
pub mod handler;
pub mod tracker;
pub mod transport;

pub use acceptor::accept_websocket_connections;
pub use tracker::{ConnectionGuard, ConnectionTracker};
