//! Connection handler for individual client sessions.
//!
//! Each accepted client gets a `ConnectionHandler` that:
//! - Registers the connection with the registry (exactly once)
//! - Parses inbound newline-delimited JSON messages
//! - Dispatches them by type, replying via the connection's outbound queue
//! - Unregisters (exactly once) when the transport closes or a protocol
//!   error ends the session
//!
//! Socket writes do not happen here: a companion writer task owns the
//! write half and drains the outbound queue, so neither the handler nor
//! the registry ever blocks on a slow peer.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use roadwatch_core::ConnectionId;
use roadwatch_protocol::{ClientMessage, ServerMessage};

use crate::registry::{OutboundSender, RegistryHandle};

/// Per-connection outbound queue depth.
pub const OUTBOUND_BUFFER: usize = 64;

/// Maximum inbound message size (1 MiB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Write timeout for a single outbound line
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client session.
///
/// Owns the read half of the stream for the session's lifetime and drives
/// the per-connection state machine: register on accept, dispatch inbound
/// messages while active, unregister on close.
pub struct ConnectionHandler {
    /// Identity of this connection in the registry
    id: ConnectionId,

    /// Buffered reader for inbound messages
    reader: BufReader<OwnedReadHalf>,

    /// Sending side of this connection's outbound queue
    outbound: OutboundSender,

    /// Handle to the connection registry
    registry: RegistryHandle,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        id: ConnectionId,
        reader: OwnedReadHalf,
        outbound: OutboundSender,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            id,
            reader: BufReader::new(reader),
            outbound,
            registry,
        }
    }

    /// Drives the session from registration to teardown.
    ///
    /// Registers exactly once, then loops on inbound messages until the
    /// client closes the connection or a protocol error ends the session,
    /// and finally unregisters exactly once. Errors never propagate past
    /// this point; one bad session cannot affect any other.
    pub async fn run(mut self) {
        if self
            .registry
            .register(self.id, self.outbound.clone())
            .await
            .is_err()
        {
            warn!(conn_id = %self.id, "Registry unavailable, dropping connection");
            return;
        }

        match self.process_messages().await {
            Ok(()) => debug!(conn_id = %self.id, "Client closed connection"),
            Err(e) => debug!(conn_id = %self.id, error = %e, "Session ended"),
        }

        if self.registry.unregister(self.id).await.is_err() {
            debug!(conn_id = %self.id, "Registry gone during unregister");
        }

        info!(conn_id = %self.id, "Client disconnected");
    }

    /// Main message processing loop.
    ///
    /// Reads and dispatches messages until EOF (clean close, `Ok`) or an
    /// error that closes the session.
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match self.read_message().await {
                Ok(msg) => msg,
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            };

            self.handle_message(msg).await?;
        }
    }

    /// Dispatches a single inbound message.
    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        match msg {
            ClientMessage::Ping => {
                self.send_message(ServerMessage::pong()).await?;
            }

            ClientMessage::GetStats => {
                let stats = self.registry.snapshot().await;
                self.send_message(ServerMessage::stats(stats)).await?;
            }

            ClientMessage::StartMonitoring => {
                self.registry
                    .set_monitoring(true)
                    .await
                    .map_err(|e| ConnectionError::Registry(e.to_string()))?;
                self.send_message(ServerMessage::monitoring_started(
                    "Monitoring started successfully",
                ))
                .await?;
            }

            ClientMessage::StopMonitoring => {
                self.registry
                    .set_monitoring(false)
                    .await
                    .map_err(|e| ConnectionError::Registry(e.to_string()))?;
                self.send_message(ServerMessage::monitoring_stopped(
                    "Monitoring stopped successfully",
                ))
                .await?;
            }

            ClientMessage::Unknown => {
                // Named no-op branch: unrecognized or missing types are
                // ignored for forward compatibility. No reply, no state
                // change.
                debug!(conn_id = %self.id, "Ignoring message with unknown type");
            }
        }

        Ok(())
    }

    /// Reads a single message from the client.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        ClientMessage::parse(&line).map_err(|e| ConnectionError::Parse(e.to_string()))
    }

    /// Queues a reply to this connection.
    async fn send_message(&self, msg: ServerMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::Parse(e.to_string()))?;

        self.outbound
            .send(json)
            .await
            .map_err(|_| ConnectionError::OutboundClosed)
    }
}

/// Spawns the writer task that drains a connection's outbound queue onto
/// the socket.
///
/// The task exits on write error or timeout, dropping the receiver. The
/// closed queue is then observed by the registry on the next broadcast
/// (and by the handler on the next reply), which removes the connection.
pub fn spawn_writer_task(
    id: ConnectionId,
    writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<String>,
) {
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);

        while let Some(json) = outbound_rx.recv().await {
            let result = timeout(WRITE_TIMEOUT, async {
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                Ok::<(), std::io::Error>(())
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(conn_id = %id, error = %e, "Write failed, closing outbound queue");
                    break;
                }
                Err(_) => {
                    debug!(conn_id = %id, "Write timed out, closing outbound queue");
                    break;
                }
            }
        }
    });
}

/// Errors that can occur during connection handling.
///
/// All of these are local to one session: they end that session and
/// nothing else.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("connection closed")]
    Eof,

    #[error("outbound queue closed")]
    OutboundClosed,

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("registry error: {0}")]
    Registry(String),
}
