//! TCP server for the roadwatch hub.
//!
//! The server:
//! - Listens on a TCP address for persistent client connections
//! - Spawns a ConnectionHandler plus a writer task for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    HubServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ outbound queue
//!         ▼
//! ┌─────────────────┐
//! │   writer task   │
//! │  (per client)   │
//! └─────────────────┘
//! ```
//!
//! Accepting new connections never waits on any individual session; each
//! session runs in its own task, and cancelling one cannot affect the
//! others or the registry.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, OUTBOUND_BUFFER};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use roadwatch_core::ConnectionId;

use crate::registry::RegistryHandle;

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8900";

/// TCP server for the roadwatch hub.
///
/// Accepts client connections and wires each one to the registry.
pub struct HubServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Counter for assigning connection identities
    connection_counter: AtomicU64,
}

impl HubServer {
    /// Binds the listener and creates the server.
    ///
    /// Binding eagerly (rather than inside `run`) lets callers learn the
    /// actual address when binding to port 0.
    pub async fn bind(
        addr: &str,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Hub server listening"),
            Err(_) => info!("Hub server listening"),
        }

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Wires up a new client: one handler task for the read side, one
    /// writer task draining the outbound queue.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let registry = self.registry.clone();
        let id = ConnectionId::new(connection_number);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        connection::spawn_writer_task(id, writer, outbound_rx);

        tokio::spawn(async move {
            debug!(conn_id = %id, peer = %peer, "Accepted connection");
            let handler = ConnectionHandler::new(id, reader, outbound_tx, registry);
            handler.run().await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },
}
