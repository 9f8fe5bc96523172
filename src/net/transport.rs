//! WebSocket transport
//!
//! Wraps a tungstenite stream for browser clients. After the upgrade the
//! stream is split so one task can read client frames while another drains
//! the outbound queue.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tracing::{debug, trace};
use tungstenite::error::CapacityError;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::{Error as WsError, Message};

use crate::error::{NetworkError, ProtocolError, RelayError, Result};

/// WebSocket transport for browser clients
pub struct WebSocketTransport {
    stream: WebSocketStream<TcpStream>,
}

impl WebSocketTransport {
    /// Upgrade a TCP stream, rejecting messages larger than `max_message_size`
    pub async fn accept(stream: TcpStream, max_message_size: usize) -> Result<Self> {
        let config = WebSocketConfig {
            max_message_size: Some(max_message_size),
            max_frame_size: Some(max_message_size),
            ..WebSocketConfig::default()
        };

        let stream = accept_async_with_config(stream, Some(config))
            .await
            .map_err(map_ws_error)?;

        Ok(Self { stream })
    }

    /// Split into independent read and write halves
    pub fn split(self) -> (FrameReader, FrameWriter) {
        let (sink, stream) = self.stream.split();
        (FrameReader { stream }, FrameWriter { sink })
    }
}

/// Read half: yields client text frames
pub struct FrameReader {
    stream: SplitStream<WebSocketStream<TcpStream>>,
}

impl FrameReader {
    /// Wait for the next text frame.
    ///
    /// Returns `Ok(None)` when the peer closes. Binary and control frames are
    /// skipped; pings are answered by tungstenite. Every frame, pongs
    /// included, restarts the `idle` window; a peer silent for the whole
    /// window fails with [`NetworkError::Timeout`].
    pub async fn next_text(&mut self, idle: Option<Duration>) -> Result<Option<String>> {
        loop {
            let next = match idle {
                Some(limit) => tokio::time::timeout(limit, self.stream.next())
                    .await
                    .map_err(|_| RelayError::Network(NetworkError::Timeout))?,
                None => self.stream.next().await,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received text WebSocket message");
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(
                        error = %ProtocolError::UnexpectedBinary(data.len()),
                        "Ignoring binary WebSocket message"
                    );
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("WebSocket close message received");
                    return Ok(None);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None)
                }
                Some(Err(e)) => return Err(map_ws_error(e)),
            }
        }
    }
}

/// Write half: sends server text frames
pub struct FrameWriter {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
}

impl FrameWriter {
    /// Send one text frame
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        trace!(len = text.len(), "Sending text WebSocket message");
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(map_ws_error)
    }

    /// Send a ping; browsers answer with a pong automatically
    pub async fn send_ping(&mut self) -> Result<()> {
        trace!("Sending WebSocket ping");
        self.sink
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(map_ws_error)
    }

    /// Close the WebSocket connection gracefully
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(map_ws_error)
    }
}

fn map_ws_error(err: WsError) -> RelayError {
    match err {
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            RelayError::Protocol(ProtocolError::MessageTooLarge {
                size,
                max: max_size,
            })
        }
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            RelayError::Network(NetworkError::ConnectionClosed)
        }
        WsError::Io(e) => RelayError::Io(e),
        other => RelayError::Network(NetworkError::WebSocket(other.to_string())),
    }
}
