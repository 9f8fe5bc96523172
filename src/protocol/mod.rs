//! Relay protocol
//!
//! JSON event envelopes exchanged with browser clients over WebSocket.

pub mod messages;

pub use messages::{
    ChatMessage, ChatRequest, ClientMessage, Departure, MovementUpdate, PlayerState,
    ServerMessage, SessionId, DEFAULT_MODEL,
};
