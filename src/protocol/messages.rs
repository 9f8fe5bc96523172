//! Relay wire messages
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`. Event names and payload field
//! names are camelCase. This is plain JSON over WebSocket; clients built
//! for a Socket.IO server need a thin adapter to speak it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, RelayError, Result};

/// Connection-scoped session identifier
pub type SessionId = u64;

/// Avatar model tag sent for every player
pub const DEFAULT_MODEL: &str = "default";

/// Last known state of one connected player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: SessionId,
    /// `null` on the wire until the client names itself
    pub display_name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation_y: f64,
    pub model: String,
}

impl PlayerState {
    /// Create a player at the given spawn point, facing forward
    pub fn spawned_at(id: SessionId, x: f64, z: f64) -> Self {
        Self {
            id,
            display_name: None,
            x,
            y: 0.0,
            z,
            rotation_y: 0.0,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Name shown to other players: the chosen display name, else the raw id
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Client movement report (`playerMovement`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementUpdate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Client chat submission (`chat`, client to server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A relayed chat line (`chat`, server to client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Sender session id
    pub id: SessionId,
    pub display_name: String,
    pub message: String,
}

/// Payload of `playerDisconnected`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub id: SessionId,
    pub display_name: String,
}

/// Messages sent by browser clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    PlayerMovement(MovementUpdate),
    Chat(ChatRequest),
}

impl ClientMessage {
    /// Decode a client frame
    pub fn from_json(text: &str) -> std::result::Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Event name, for logging
    pub fn event(&self) -> &'static str {
        match self {
            ClientMessage::PlayerMovement(_) => "playerMovement",
            ClientMessage::Chat(_) => "chat",
        }
    }
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full registry snapshot, keyed by session id
    CurrentPlayers(BTreeMap<SessionId, PlayerState>),
    NewPlayer(PlayerState),
    PlayerMoved(PlayerState),
    PlayerDisconnected(Departure),
    Chat(ChatMessage),
    /// Plain-text join/leave notices
    SystemMessage(String),
}

impl ServerMessage {
    /// Encode for a WebSocket text frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RelayError::Protocol(ProtocolError::MalformedMessage(e)))
    }

    /// Event name, for logging
    pub fn event(&self) -> &'static str {
        match self {
            ServerMessage::CurrentPlayers(_) => "currentPlayers",
            ServerMessage::NewPlayer(_) => "newPlayer",
            ServerMessage::PlayerMoved(_) => "playerMoved",
            ServerMessage::PlayerDisconnected(_) => "playerDisconnected",
            ServerMessage::Chat(_) => "chat",
            ServerMessage::SystemMessage(_) => "systemMessage",
        }
    }
}
