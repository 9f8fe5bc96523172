//! Relay state machine
//!
//! [`Relay`] applies one client event at a time to the session registry and
//! chat history and returns the [`Delivery`] list the event produces. It does
//! no I/O; the actor in [`super::actor`] fans deliveries out to connections.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::protocol::{
    ChatMessage, ChatRequest, ClientMessage, Departure, MovementUpdate, ServerMessage, SessionId,
};
use crate::relay::chat::ChatHistory;
use crate::relay::registry::SessionRegistry;

/// Who receives a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Only this session
    Session(SessionId),
    /// Every session except this one
    AllExcept(SessionId),
    /// Every connected session
    All,
}

impl Target {
    /// Whether `id` is addressed by this target
    pub fn includes(&self, id: SessionId) -> bool {
        match *self {
            Target::Session(target) => target == id,
            Target::AllExcept(excluded) => excluded != id,
            Target::All => true,
        }
    }
}

/// One outbound event and its recipients
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: Target,
    pub message: ServerMessage,
}

impl Delivery {
    pub fn new(target: Target, message: ServerMessage) -> Self {
        Self { target, message }
    }
}

/// Relay tuning
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Chat messages kept for replay
    pub chat_history_capacity: usize,
    /// Half-width of the spawn square around the origin
    pub spawn_radius: f64,
    /// Connected players allowed at once
    pub max_players: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            chat_history_capacity: super::chat::DEFAULT_CHAT_HISTORY,
            spawn_radius: 2.0,
            max_players: 500,
        }
    }
}

/// Session registry plus chat history, driven by connection events
pub struct Relay {
    settings: RelaySettings,
    registry: SessionRegistry,
    chat: ChatHistory,
    rng: StdRng,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Create a relay with a fixed spawn RNG
    pub fn with_rng(settings: RelaySettings, rng: StdRng) -> Self {
        let chat = ChatHistory::new(settings.chat_history_capacity);
        Self {
            settings,
            registry: SessionRegistry::new(),
            chat,
            rng,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn chat_history(&self) -> &ChatHistory {
        &self.chat
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether another player can join
    pub fn has_capacity(&self) -> bool {
        self.registry.len() < self.settings.max_players
    }

    /// A new connection joined.
    ///
    /// The newcomer gets the full snapshot (itself included) followed by the
    /// chat history oldest-first; everybody else gets `newPlayer`.
    pub fn on_connect(&mut self, id: SessionId) -> Vec<Delivery> {
        let state = self
            .registry
            .spawn(id, self.settings.spawn_radius, &mut self.rng);

        let mut deliveries = Vec::with_capacity(self.chat.len() + 2);
        deliveries.push(Delivery::new(
            Target::Session(id),
            ServerMessage::CurrentPlayers(self.registry.snapshot()),
        ));
        deliveries.extend(
            self.chat
                .iter()
                .map(|line| Delivery::new(Target::Session(id), ServerMessage::Chat(line.clone()))),
        );
        deliveries.push(Delivery::new(
            Target::AllExcept(id),
            ServerMessage::NewPlayer(state),
        ));

        info!(
            session_id = id,
            players = self.registry.len(),
            replayed = self.chat.len(),
            "Player joined"
        );

        deliveries
    }

    /// A client reported its transform. Unknown sessions are ignored.
    pub fn on_move(&mut self, id: SessionId, update: MovementUpdate) -> Vec<Delivery> {
        let Some(outcome) = self.registry.apply_movement(id, update) else {
            debug!(session_id = id, "Movement for unknown session ignored");
            return Vec::new();
        };

        let mut deliveries = vec![Delivery::new(
            Target::AllExcept(id),
            ServerMessage::PlayerMoved(outcome.state),
        )];

        if let Some(name) = outcome.named {
            deliveries.push(Delivery::new(
                Target::All,
                ServerMessage::SystemMessage(format!("{} has joined the game.", name)),
            ));
        }

        deliveries
    }

    /// A client sent chat. The sender receives its own line back.
    pub fn on_chat(&mut self, id: SessionId, request: ChatRequest) -> Vec<Delivery> {
        let Some(player) = self.registry.get(id) else {
            debug!(session_id = id, "Chat from unknown session ignored");
            return Vec::new();
        };

        // Explicit name, then stored name, then the raw id
        let display_name = request
            .display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| player.label());

        let line = ChatMessage {
            id,
            display_name,
            message: request.message,
        };

        let evicted = self.chat.push(line.clone());
        debug!(
            session_id = id,
            history = self.chat.len(),
            evicted = evicted,
            "Chat relayed"
        );

        vec![Delivery::new(Target::All, ServerMessage::Chat(line))]
    }

    /// A connection closed. Unknown sessions are ignored.
    ///
    /// Deliveries address the remaining players only; the departed session is
    /// already gone from the registry when they are produced.
    pub fn on_disconnect(&mut self, id: SessionId) -> Vec<Delivery> {
        let Some(state) = self.registry.remove(id) else {
            return Vec::new();
        };

        let display_name = state.label();
        info!(
            session_id = id,
            display_name = %display_name,
            players = self.registry.len(),
            "Player left"
        );

        vec![
            Delivery::new(
                Target::All,
                ServerMessage::PlayerDisconnected(Departure {
                    id,
                    display_name: display_name.clone(),
                }),
            ),
            Delivery::new(
                Target::All,
                ServerMessage::SystemMessage(format!("{} has left the game.", display_name)),
            ),
        ]
    }

    /// Route a decoded client message to its handler
    pub fn dispatch(&mut self, id: SessionId, message: ClientMessage) -> Vec<Delivery> {
        match message {
            ClientMessage::PlayerMovement(update) => self.on_move(id, update),
            ClientMessage::Chat(request) => self.on_chat(id, request),
        }
    }

    /// Drop every session without producing deliveries
    pub fn clear(&mut self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relay() -> Relay {
        Relay::with_rng(RelaySettings::default(), StdRng::seed_from_u64(42))
    }

    fn movement(x: f64, name: Option<&str>) -> MovementUpdate {
        MovementUpdate {
            x,
            y: 0.0,
            z: 1.0,
            rotation_y: 0.25,
            display_name: name.map(str::to_string),
        }
    }

    fn chat(text: &str) -> ChatRequest {
        ChatRequest {
            message: text.to_string(),
            display_name: None,
        }
    }

    #[test]
    fn test_connect_sends_snapshot_and_announces() {
        let mut relay = relay();
        relay.on_connect(1);
        let deliveries = relay.on_connect(2);

        assert_eq!(deliveries.len(), 2);

        let first = &deliveries[0];
        assert_eq!(first.target, Target::Session(2));
        match &first.message {
            ServerMessage::CurrentPlayers(players) => {
                assert!(players.contains_key(&1));
                assert!(players.contains_key(&2));
            }
            other => panic!("expected currentPlayers, got {:?}", other),
        }

        let second = &deliveries[1];
        assert_eq!(second.target, Target::AllExcept(2));
        assert!(matches!(&second.message, ServerMessage::NewPlayer(p) if p.id == 2));
    }

    #[test]
    fn test_connect_replays_history_in_order() {
        let mut relay = relay();
        relay.on_connect(1);
        relay.on_chat(1, chat("first"));
        relay.on_chat(1, chat("second"));

        let deliveries = relay.on_connect(2);
        let replayed: Vec<&str> = deliveries
            .iter()
            .filter_map(|d| match &d.message {
                ServerMessage::Chat(line) => {
                    assert_eq!(d.target, Target::Session(2));
                    Some(line.message.as_str())
                }
                _ => None,
            })
            .collect();

        assert_eq!(replayed, vec!["first", "second"]);
        // Snapshot first, announcement last
        assert!(matches!(
            deliveries.first().map(|d| &d.message),
            Some(ServerMessage::CurrentPlayers(_))
        ));
        assert!(matches!(
            deliveries.last().map(|d| &d.message),
            Some(ServerMessage::NewPlayer(_))
        ));
    }

    #[test]
    fn test_move_broadcasts_to_others() {
        let mut relay = relay();
        relay.on_connect(1);
        relay.on_connect(2);

        let deliveries = relay.on_move(1, movement(4.0, None));
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, Target::AllExcept(1));
        match &deliveries[0].message {
            ServerMessage::PlayerMoved(state) => {
                assert_eq!(state.id, 1);
                assert_eq!(state.x, 4.0);
                assert_eq!(state.rotation_y, 0.25);
            }
            other => panic!("expected playerMoved, got {:?}", other),
        }
    }

    #[test]
    fn test_move_unknown_session_is_noop() {
        let mut relay = relay();
        relay.on_connect(1);
        let before = relay.registry().snapshot();

        assert!(relay.on_move(99, movement(4.0, Some("ghost"))).is_empty());
        assert_eq!(relay.registry().snapshot(), before);
    }

    #[test]
    fn test_first_name_announces_join() {
        let mut relay = relay();
        relay.on_connect(1);

        let deliveries = relay.on_move(1, movement(0.0, Some("Ayla")));
        assert_eq!(deliveries.len(), 2);
        assert_eq!(
            deliveries[1],
            Delivery::new(
                Target::All,
                ServerMessage::SystemMessage("Ayla has joined the game.".to_string())
            )
        );

        // Second naming attempt is ignored and not announced
        let deliveries = relay.on_move(1, movement(0.0, Some("Bram")));
        assert_eq!(deliveries.len(), 1);
        assert_eq!(relay.registry().display_name(1), Some("Ayla"));
    }

    #[test]
    fn test_chat_name_resolution() {
        let mut relay = relay();
        relay.on_connect(1);

        // Raw id when nothing is known
        let deliveries = relay.on_chat(1, chat("hello"));
        assert_eq!(
            deliveries,
            vec![Delivery::new(
                Target::All,
                ServerMessage::Chat(ChatMessage {
                    id: 1,
                    display_name: "1".to_string(),
                    message: "hello".to_string(),
                })
            )]
        );

        // Stored name
        relay.on_move(1, movement(0.0, Some("Ayla")));
        let deliveries = relay.on_chat(1, chat("again"));
        assert!(matches!(
            &deliveries[0].message,
            ServerMessage::Chat(line) if line.display_name == "Ayla"
        ));

        // Explicit name wins, empty explicit name does not
        let deliveries = relay.on_chat(
            1,
            ChatRequest {
                message: "x".to_string(),
                display_name: Some("Captain".to_string()),
            },
        );
        assert!(matches!(
            &deliveries[0].message,
            ServerMessage::Chat(line) if line.display_name == "Captain"
        ));

        let deliveries = relay.on_chat(
            1,
            ChatRequest {
                message: "y".to_string(),
                display_name: Some(String::new()),
            },
        );
        assert!(matches!(
            &deliveries[0].message,
            ServerMessage::Chat(line) if line.display_name == "Ayla"
        ));
    }

    #[test]
    fn test_chat_from_unknown_session_ignored() {
        let mut relay = relay();
        assert!(relay.on_chat(5, chat("hi")).is_empty());
        assert!(relay.chat_history().is_empty());
    }

    #[test]
    fn test_fifty_one_chats_keep_latest_fifty() {
        let mut relay = relay();
        relay.on_connect(1);
        for n in 1..=51 {
            relay.on_chat(1, chat(&format!("line {}", n)));
        }

        let history: Vec<&str> = relay
            .chat_history()
            .iter()
            .map(|l| l.message.as_str())
            .collect();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0], "line 2");
        assert_eq!(history[49], "line 51");
    }

    #[test]
    fn test_disconnect_announces_departure() {
        let mut relay = relay();
        relay.on_connect(1);
        relay.on_connect(2);
        relay.on_move(1, movement(0.0, Some("Ayla")));

        let deliveries = relay.on_disconnect(1);
        assert!(!relay.registry().contains(1));
        assert_eq!(
            deliveries,
            vec![
                Delivery::new(
                    Target::All,
                    ServerMessage::PlayerDisconnected(Departure {
                        id: 1,
                        display_name: "Ayla".to_string(),
                    })
                ),
                Delivery::new(
                    Target::All,
                    ServerMessage::SystemMessage("Ayla has left the game.".to_string())
                ),
            ]
        );

        // Second disconnect is a no-op
        assert!(relay.on_disconnect(1).is_empty());
    }

    #[test]
    fn test_registry_matches_connected_set_after_replay() {
        let mut relay = relay();
        let mut expected = std::collections::BTreeMap::new();

        // connect 1..=6, move some, drop evens, move the rest again
        for id in 1..=6 {
            relay.on_connect(id);
        }
        for id in 1..=6 {
            relay.on_move(id, movement(id as f64, None));
        }
        for id in (2..=6).step_by(2) {
            relay.on_disconnect(id);
        }
        for id in [1, 3, 5] {
            relay.on_move(id, movement(id as f64 * 10.0, None));
            expected.insert(id, id as f64 * 10.0);
        }
        relay.on_move(4, movement(99.0, None));

        let snapshot = relay.registry().snapshot();
        let actual: std::collections::BTreeMap<SessionId, f64> =
            snapshot.iter().map(|(id, p)| (*id, p.x)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_dispatch_routes_by_event() {
        let mut relay = relay();
        relay.on_connect(1);

        let deliveries = relay.dispatch(1, ClientMessage::Chat(chat("via dispatch")));
        assert!(matches!(&deliveries[0].message, ServerMessage::Chat(_)));

        let deliveries = relay.dispatch(1, ClientMessage::PlayerMovement(movement(1.0, None)));
        assert!(matches!(&deliveries[0].message, ServerMessage::PlayerMoved(_)));
    }

    #[test]
    fn test_target_includes() {
        assert!(Target::All.includes(3));
        assert!(Target::Session(3).includes(3));
        assert!(!Target::Session(3).includes(4));
        assert!(Target::AllExcept(3).includes(4));
        assert!(!Target::AllExcept(3).includes(3));
    }
}
