//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor. It is the surface used both by session
//! handlers (register, unregister, replies) and by external collaborators
//! such as an HTTP layer (snapshot, set_monitoring, broadcast).
//!
//! Channel errors are mapped to `RegistryError::ChannelClosed`; read-only
//! and best-effort operations degrade gracefully instead.

use tokio::sync::{mpsc, oneshot};

use roadwatch_core::{ConnectionId, MonitoringState};
use roadwatch_protocol::ServerMessage;

use super::commands::{OutboundSender, RegistryCommand, RegistryError};

/// Handle for interacting with the registry actor.
///
/// Cheap to clone and shareable across tasks. All methods communicate
/// with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Creates a new registry handle over the given command channel.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Registers a connection with the registry.
    ///
    /// The caller must register each connection exactly once; the session
    /// handler's state machine guarantees this.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        id: ConnectionId,
        outbound: OutboundSender,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                id,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Unregisters a connection. Safe to call for a connection that is
    /// already gone.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister { id, respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Delivers a message to every registered connection, best-effort.
    ///
    /// Partial failure is fully absorbed: dead connections are removed
    /// along the way and nothing is surfaced to the caller. The future
    /// completes once the fan-out (including any removals) is done, so a
    /// following `snapshot` observes the reconciled count. If the actor is
    /// gone this is a no-op.
    pub async fn broadcast(&self, message: ServerMessage) {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Broadcast {
                message,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return;
        }

        let _ = rx.await;
    }

    /// Sets the monitoring flag.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn set_monitoring(&self, active: bool) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::SetMonitoring {
                active,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Returns a consistent copy of the current monitoring state.
    ///
    /// Returns the initial state if communication with the actor fails.
    pub async fn snapshot(&self) -> MonitoringState {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return MonitoringState::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Checks if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        (RegistryHandle::new(cmd_tx), cmd_rx)
    }

    fn test_outbound() -> OutboundSender {
        mpsc::channel(4).0
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let _cloned = handle.clone();
        // Compiles = test passes
    }

    #[tokio::test]
    async fn test_register_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Register { id, respond_to, .. }) = rx.recv().await {
                assert_eq!(id, ConnectionId::new(7));
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        let result = handle.register(ConnectionId::new(7), test_outbound()).await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_register_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx); // Close the channel

        let result = handle.register(ConnectionId::new(1), test_outbound()).await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_unregister_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Unregister { id, respond_to }) = rx.recv().await {
                assert_eq!(id, ConnectionId::new(3));
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        assert!(handle.unregister(ConnectionId::new(3)).await.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_awaits_ack() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Broadcast { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        handle.broadcast(ServerMessage::pong()).await;
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_ignores_closed_channel() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        // Should not panic or error
        handle.broadcast(ServerMessage::pong()).await;
    }

    #[tokio::test]
    async fn test_snapshot_returns_default_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let state = handle.snapshot().await;
        assert_eq!(state, MonitoringState::default());
    }

    #[tokio::test]
    async fn test_set_monitoring_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.set_monitoring(true).await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();

        assert!(handle.is_connected());

        drop(rx);
        // Need to send to detect closure
        handle.broadcast(ServerMessage::pong()).await;

        assert!(!handle.is_connected());
    }
}
