//! API response types

use serde::{Deserialize, Serialize};

/// Body of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `"online"` while the relay answers
    pub status: String,
    /// Connected players
    pub players: usize,
    /// Seconds since startup
    pub uptime: f64,
}

impl StatusResponse {
    pub fn online(players: usize, uptime: f64) -> Self {
        Self {
            status: "online".to_string(),
            players,
            uptime,
        }
    }
}
