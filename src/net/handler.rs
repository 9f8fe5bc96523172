//! Connection handler module
//!
//! Handles the lifecycle of one browser connection:
//! - Per-IP admission and WebSocket upgrade
//! - Registration with the relay actor
//! - Reading client frames and forwarding decoded events
//! - Draining the outbound queue to the socket and keeping it alive with pings
//! - Disconnect notification on every exit path

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::net::transport::{FrameReader, FrameWriter, WebSocketTransport};
use crate::protocol::{ClientMessage, SessionId};
use crate::AppState;

/// Connection handler for browser clients
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a WebSocket connection
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        // Held until this function returns
        let _slot = self.state.connections.try_acquire(addr.ip())?;

        stream.set_nodelay(true)?;

        let transport =
            WebSocketTransport::accept(stream, self.state.config.max_message_size).await?;
        let (mut reader, mut writer) = transport.split();

        let (outbound_tx, outbound_rx) = mpsc::channel(self.state.config.outbound_queue_size);

        let session_id = match self.state.relay.connect(addr, outbound_tx).await {
            Ok(id) => id,
            Err(e) => {
                let _ = writer.close().await;
                return Err(e);
            }
        };

        info!(session_id = session_id, address = %addr, "WebSocket session established");

        let writer_task = tokio::spawn(drain_outbound(
            session_id,
            writer,
            outbound_rx,
            self.state.config.ping_interval(),
        ));

        let result = self.read_loop(&mut reader, session_id).await;

        // The actor drops this session's queue, which ends the writer
        if let Err(e) = self.state.relay.disconnect(session_id).await {
            warn!(session_id = session_id, error = %e, "Failed to report disconnect");
        }
        let _ = writer_task.await;

        debug!(session_id = session_id, "Connection handler ending");
        result
    }

    /// Forward client frames until the peer goes away
    async fn read_loop(&self, reader: &mut FrameReader, session_id: SessionId) -> Result<()> {
        let idle = self.state.config.idle_timeout();

        while let Some(text) = reader.next_text(idle).await? {
            match ClientMessage::from_json(&text) {
                Ok(message) => {
                    self.state
                        .relay
                        .client_message(session_id, message)
                        .await?;
                }
                Err(e) => {
                    debug!(session_id = session_id, error = %e, "Ignoring malformed client message");
                }
            }
        }

        Ok(())
    }
}

/// Write queued frames to the socket until the queue closes or a write fails.
///
/// With `ping_every` set, a ping goes out on each tick so the client's pong
/// keeps the reader's idle timer from expiring while the player stands still.
async fn drain_outbound(
    session_id: SessionId,
    mut writer: FrameWriter,
    mut outbound_rx: mpsc::Receiver<String>,
    ping_every: Option<Duration>,
) {
    let mut ping = ping_every.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.send_text(frame).await {
                    debug!(session_id = session_id, error = %e, "Outbound write failed");
                    return;
                }
            }
            _ = tick(&mut ping) => {
                if let Err(e) = writer.send_ping().await {
                    debug!(session_id = session_id, error = %e, "Ping failed");
                    return;
                }
            }
        }
    }

    let _ = writer.close().await;
}

/// Next ping tick, or never when pings are disabled
async fn tick(ping: &mut Option<time::Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
