//! Error handling module
//!
//! Defines custom error types for the relay server.

use std::io;

use thiserror::Error;

/// Main error type for the relay server
#[derive(Error, Debug)]
pub enum RelayError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Network-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection idle timeout")]
    Timeout,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Too many connections from {0}")]
    TooManyConnections(String),

    #[error("Server full ({0} players)")]
    ServerFull(usize),

    #[error("Relay unavailable")]
    RelayUnavailable,
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Unexpected binary frame ({0} bytes)")]
    UnexpectedBinary(usize),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
