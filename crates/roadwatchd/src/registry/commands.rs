//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the
//! `RegistryActor`:
//! - `RegistryCommand`: commands sent to the actor
//! - `RegistryError`: errors surfaced by the handle
//!
//! All types are designed for async message passing and follow the
//! panic-free policy.

use roadwatch_core::{ConnectionId, MonitoringState};
use roadwatch_protocol::ServerMessage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Outbound queue for one connection.
///
/// The registry holds only the sending side; a per-connection writer task
/// owns the receiving side together with the socket write half. A closed
/// queue is how the registry observes a dead transport.
pub type OutboundSender = mpsc::Sender<String>;

/// Commands sent to the registry actor.
///
/// Each command carries a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add a connection to the live set.
    ///
    /// Recomputes the connection count and records the mutation time.
    /// The session handler guarantees it registers each connection
    /// exactly once.
    Register {
        /// Identity of the new connection
        id: ConnectionId,
        /// Sending side of the connection's outbound queue
        outbound: OutboundSender,
        /// Acknowledged once the connection is in the set
        respond_to: oneshot::Sender<()>,
    },

    /// Remove a connection from the live set.
    ///
    /// A no-op (not an error) if the connection is absent, so a
    /// double-unregister is always safe.
    Unregister {
        /// Identity of the connection to remove
        id: ConnectionId,
        /// Acknowledged once the set has been reconciled
        respond_to: oneshot::Sender<()>,
    },

    /// Deliver a message to every currently registered connection.
    ///
    /// Per-connection delivery failure is isolated: a dead connection is
    /// removed from the set and delivery continues to the rest. The ack
    /// fires only after any removals have been reconciled, so the
    /// connection count is consistent by the time the caller resumes.
    Broadcast {
        /// The message to fan out
        message: ServerMessage,
        /// Acknowledged once delivery and reconciliation are complete
        respond_to: oneshot::Sender<()>,
    },

    /// Set the monitoring flag.
    SetMonitoring {
        /// New value of the flag
        active: bool,
        /// Acknowledged once the state is mutated
        respond_to: oneshot::Sender<()>,
    },

    /// Get a consistent copy of the current monitoring state.
    Snapshot {
        /// Channel to send the copy
        respond_to: oneshot::Sender<MonitoringState>,
    },
}

/// Errors surfaced by registry handle operations.
///
/// The registry operations themselves have no failure modes; the only
/// thing that can go wrong is the actor being gone.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The command or response channel was closed.
    ///
    /// This typically indicates the actor was shut down.
    #[error("registry channel closed")]
    ChannelClosed,
}
