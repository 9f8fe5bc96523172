//! Relay actor
//!
//! A single task owns the [`Relay`] and the outbound queue of every
//! connection. Connection handlers talk to it through a [`RelayHandle`], so
//! all registry and history mutation happens one command at a time.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{NetworkError, RelayError, Result};
use crate::protocol::{ClientMessage, SessionId};
use crate::relay::dispatch::{Delivery, Relay, Target};

/// Command queue length between connections and the actor
const COMMAND_QUEUE_SIZE: usize = 1024;

/// Outbound text frames for one connection
pub type Outbound = mpsc::Sender<String>;

/// Relay status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatus {
    pub players: usize,
}

/// Commands accepted by the relay actor
#[derive(Debug)]
pub enum RelayCommand {
    /// Register a connection; replies with its session id
    Connect {
        address: SocketAddr,
        outbound: Outbound,
        reply: oneshot::Sender<std::result::Result<SessionId, NetworkError>>,
    },
    /// A decoded client message
    Client {
        session_id: SessionId,
        message: ClientMessage,
    },
    /// The connection closed
    Disconnect { session_id: SessionId },
    /// Report the current player count
    Status { reply: oneshot::Sender<RelayStatus> },
}

/// Cloneable handle to the relay actor
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Register a connection and get its session id
    pub async fn connect(&self, address: SocketAddr, outbound: Outbound) -> Result<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Connect {
            address,
            outbound,
            reply,
        })
        .await?;

        let assigned = rx.await.map_err(|_| unavailable())?;
        assigned.map_err(RelayError::Network)
    }

    /// Forward a decoded client message
    pub async fn client_message(&self, session_id: SessionId, message: ClientMessage) -> Result<()> {
        self.send(RelayCommand::Client {
            session_id,
            message,
        })
        .await
    }

    /// Report a closed connection
    pub async fn disconnect(&self, session_id: SessionId) -> Result<()> {
        self.send(RelayCommand::Disconnect { session_id }).await
    }

    /// Query the relay status
    pub async fn status(&self) -> Result<RelayStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Status { reply }).await?;
        rx.await.map_err(|_| unavailable())
    }

    async fn send(&self, command: RelayCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| unavailable())
    }
}

fn unavailable() -> RelayError {
    RelayError::Network(NetworkError::RelayUnavailable)
}

/// The task that owns relay state
pub struct RelayActor {
    relay: Relay,
    peers: HashMap<SessionId, Outbound>,
    next_id: SessionId,
    rx: mpsc::Receiver<RelayCommand>,
}

impl RelayActor {
    /// Create an actor and the handle that feeds it
    pub fn new(relay: Relay) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let actor = Self {
            relay,
            peers: HashMap::new(),
            next_id: 1,
            rx,
        };
        (actor, RelayHandle { tx })
    }

    /// Spawn the actor on the current runtime
    pub fn spawn(relay: Relay, shutdown_rx: broadcast::Receiver<()>) -> (RelayHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(relay);
        let task = tokio::spawn(actor.run(shutdown_rx));
        (handle, task)
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Relay actor started");

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => {
                            debug!("All relay handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Relay actor received shutdown signal");
                    break;
                }
            }
        }

        // Dropping the outbound senders ends every connection writer
        let remaining = self.peers.len();
        self.peers.clear();
        self.relay.clear();
        info!(sessions = remaining, "Relay actor stopped");
    }

    fn handle(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Connect {
                address,
                outbound,
                reply,
            } => {
                if !self.relay.has_capacity() {
                    let max = self.relay.settings().max_players;
                    warn!(address = %address, max_players = max, "Rejecting connection, server full");
                    let _ = reply.send(Err(NetworkError::ServerFull(max)));
                    return;
                }

                let session_id = self.next_id;
                self.next_id += 1;

                // The handler may have given up waiting; nothing to register then
                if reply.send(Ok(session_id)).is_err() {
                    debug!(session_id = session_id, "Connection dropped before registration");
                    return;
                }

                self.peers.insert(session_id, outbound);
                debug!(session_id = session_id, address = %address, "Session registered");

                let deliveries = self.relay.on_connect(session_id);
                self.fan_out(deliveries);
            }
            RelayCommand::Client {
                session_id,
                message,
            } => {
                trace!(session_id = session_id, event = message.event(), "Client event");
                let deliveries = self.relay.dispatch(session_id, message);
                self.fan_out(deliveries);
            }
            RelayCommand::Disconnect { session_id } => {
                self.peers.remove(&session_id);
                let deliveries = self.relay.on_disconnect(session_id);
                self.fan_out(deliveries);
            }
            RelayCommand::Status { reply } => {
                let _ = reply.send(RelayStatus {
                    players: self.relay.player_count(),
                });
            }
        }
    }

    /// Best-effort delivery: a full or closed queue drops the event for that
    /// recipient only.
    fn fan_out(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let frame = match delivery.message.to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(event = delivery.message.event(), error = %e, "Failed to encode event");
                    continue;
                }
            };

            match delivery.target {
                Target::Session(id) => self.deliver(id, frame),
                target => {
                    for id in self.peers.keys().copied().filter(|id| target.includes(*id)) {
                        self.deliver(id, frame.clone());
                    }
                }
            }
        }
    }

    fn deliver(&self, id: SessionId, frame: String) {
        let Some(outbound) = self.peers.get(&id) else {
            return;
        };

        match outbound.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = id, "Outbound queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = id, "Outbound queue closed, dropping event");
            }
        }
    }
}
