//! Session registry
//!
//! Maps session ids to the last transform each client reported. Only the
//! relay actor owns one, so no interior locking is needed.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use crate::protocol::{MovementUpdate, PlayerState, SessionId};

/// Outcome of applying a movement report
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    /// State after the update
    pub state: PlayerState,
    /// Set when this update stored the player's first display name
    pub named: Option<String>,
}

/// In-memory registry of connected players
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: BTreeMap<SessionId, PlayerState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session at a random point in the `[-radius, radius)` square
    /// around the origin. Re-registering an id replaces its state.
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        id: SessionId,
        radius: f64,
        rng: &mut R,
    ) -> PlayerState {
        let (x, z) = if radius > 0.0 {
            (rng.gen_range(-radius..radius), rng.gen_range(-radius..radius))
        } else {
            (0.0, 0.0)
        };

        let state = PlayerState::spawned_at(id, x, z);
        self.players.insert(id, state.clone());

        debug!(session_id = id, x = x, z = z, "Player spawned");
        state
    }

    /// Overwrite a session's transform. Returns `None` for unknown ids.
    ///
    /// The display name is stored only the first time a non-empty one is
    /// reported; later names are ignored.
    pub fn apply_movement(&mut self, id: SessionId, update: MovementUpdate) -> Option<MoveOutcome> {
        let player = self.players.get_mut(&id)?;

        player.x = update.x;
        player.y = update.y;
        player.z = update.z;
        player.rotation_y = update.rotation_y;

        let mut named = None;
        if player.display_name.is_none() {
            if let Some(name) = update.display_name.filter(|n| !n.is_empty()) {
                debug!(session_id = id, display_name = %name, "Display name set");
                player.display_name = Some(name.clone());
                named = Some(name);
            }
        }

        Some(MoveOutcome {
            state: player.clone(),
            named,
        })
    }

    /// Remove a session, returning its last known state
    pub fn remove(&mut self, id: SessionId) -> Option<PlayerState> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.players.contains_key(&id)
    }

    /// Stored display name for a session, if any
    pub fn display_name(&self, id: SessionId) -> Option<&str> {
        self.players
            .get(&id)
            .and_then(|p| p.display_name.as_deref())
    }

    /// Copy of every player, keyed by id
    pub fn snapshot(&self) -> BTreeMap<SessionId, PlayerState> {
        self.players.clone()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
