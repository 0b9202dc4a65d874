//! Registry actor - owns the connection set and monitoring state.
//!
//! The actor is the single owner of all shared mutable state in the hub.
//! It receives commands via an mpsc channel and processes them
//! sequentially, so mutual exclusion between register, unregister,
//! broadcast, state mutation, and snapshot is structural: no operation can
//! interleave with another.
//!
//! Broadcast never awaits a network write. Delivery is a `try_send` into
//! each connection's outbound queue; the actual socket writes happen in
//! per-connection writer tasks. A slow peer therefore never blocks
//! registration of other connections.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use roadwatch_core::{ConnectionId, MonitoringState};
use roadwatch_protocol::ServerMessage;

use super::commands::{OutboundSender, RegistryCommand};

/// The registry actor - single owner of the connection set and state.
///
/// Runs in one task and processes commands sequentially. All state
/// mutations happen within that task.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live connection set: identity to outbound queue
    connections: HashMap<ConnectionId, OutboundSender>,

    /// Shared monitoring state; `total_connections` always mirrors
    /// `connections.len()`
    state: MonitoringState,
}

impl RegistryActor {
    /// Creates a new registry actor reading commands from `receiver`.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            connections: HashMap::new(),
            state: MonitoringState::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    /// Call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            connections = self.connections.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                id,
                outbound,
                respond_to,
            } => {
                self.handle_register(id, outbound);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(());
            }
            RegistryCommand::Unregister { id, respond_to } => {
                self.handle_unregister(id);
                let _ = respond_to.send(());
            }
            RegistryCommand::Broadcast {
                message,
                respond_to,
            } => {
                self.handle_broadcast(&message);
                let _ = respond_to.send(());
            }
            RegistryCommand::SetMonitoring { active, respond_to } => {
                self.handle_set_monitoring(active);
                let _ = respond_to.send(());
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Adds a connection to the live set.
    fn handle_register(&mut self, id: ConnectionId, outbound: OutboundSender) {
        if self.connections.insert(id, outbound).is_some() {
            // Session handlers register exactly once per connection, so a
            // duplicate here means a caller contract violation upstream.
            warn!(conn_id = %id, "Duplicate registration replaced existing entry");
        }
        self.state.set_connection_count(self.connections.len());

        info!(
            conn_id = %id,
            total_connections = self.connections.len(),
            "Connection registered"
        );
    }

    /// Removes a connection if present; safe to call twice.
    fn handle_unregister(&mut self, id: ConnectionId) {
        let removed = self.connections.remove(&id).is_some();
        self.state.set_connection_count(self.connections.len());

        if removed {
            info!(
                conn_id = %id,
                total_connections = self.connections.len(),
                "Connection unregistered"
            );
        } else {
            debug!(conn_id = %id, "Unregister for connection not in set");
        }
    }

    /// Fans a message out to every live connection.
    ///
    /// Serializes once, then `try_send`s the line into each outbound
    /// queue. A closed queue (writer task dead, transport gone) marks the
    /// connection failed; failed connections are removed afterwards and
    /// the count recomputed, so partial failure never leaves the state
    /// inconsistent. A full queue drops this one message for that slow
    /// consumer but keeps the connection.
    fn handle_broadcast(&mut self, message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "Failed to serialize broadcast message");
                return;
            }
        };

        let mut failed = Vec::new();

        for (id, outbound) in &self.connections {
            match outbound.try_send(json.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        conn_id = %id,
                        "Outbound queue full, dropping broadcast for this connection"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %id, "Outbound queue closed, removing connection");
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            for id in failed {
                self.connections.remove(&id);
            }
            self.state.set_connection_count(self.connections.len());
        }
    }

    /// Sets the monitoring flag.
    fn handle_set_monitoring(&mut self, active: bool) {
        self.state.set_monitoring(active);
        info!(monitoring = active, "Monitoring state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_actor() -> RegistryActor {
        let (_tx, rx) = mpsc::channel(1);
        RegistryActor::new(rx)
    }

    fn make_outbound(cap: usize) -> (OutboundSender, mpsc::Receiver<String>) {
        mpsc::channel(cap)
    }

    #[test]
    fn test_register_updates_count_and_timestamp() {
        let mut actor = make_actor();
        assert!(actor.state.last_update.is_none());

        let (tx, _rx) = make_outbound(4);
        actor.handle_register(ConnectionId::new(1), tx);

        assert_eq!(actor.state.total_connections, 1);
        assert!(actor.state.last_update.is_some());
    }

    #[test]
    fn test_unregister_is_safe_when_absent() {
        let mut actor = make_actor();
        actor.handle_unregister(ConnectionId::new(99));
        assert_eq!(actor.state.total_connections, 0);
    }

    #[test]
    fn test_register_unregister_sequence_keeps_count_consistent() {
        let mut actor = make_actor();
        let mut rxs = Vec::new();

        for n in 0..5 {
            let (tx, rx) = make_outbound(4);
            actor.handle_register(ConnectionId::new(n), tx);
            rxs.push(rx);
        }
        assert_eq!(actor.state.total_connections, 5);

        actor.handle_unregister(ConnectionId::new(2));
        actor.handle_unregister(ConnectionId::new(2)); // double-unregister
        assert_eq!(actor.state.total_connections, 4);
        assert_eq!(actor.connections.len(), 4);
    }

    #[test]
    fn test_broadcast_delivers_to_all_connections() {
        let mut actor = make_actor();
        let mut rxs = Vec::new();

        for n in 0..3 {
            let (tx, rx) = make_outbound(4);
            actor.handle_register(ConnectionId::new(n), tx);
            rxs.push(rx);
        }

        actor.handle_broadcast(&ServerMessage::monitoring_started("test"));

        for rx in rxs.iter_mut() {
            let line = rx.try_recv().expect("each connection gets the message");
            assert!(line.contains("monitoring_started"));
        }
    }

    #[test]
    fn test_broadcast_removes_exactly_the_dead_connection() {
        let mut actor = make_actor();

        let (tx_a, mut rx_a) = make_outbound(4);
        let (tx_b, rx_b) = make_outbound(4);
        let (tx_c, mut rx_c) = make_outbound(4);
        actor.handle_register(ConnectionId::new(1), tx_a);
        actor.handle_register(ConnectionId::new(2), tx_b);
        actor.handle_register(ConnectionId::new(3), tx_c);

        // Kill the middle connection's transport
        drop(rx_b);

        actor.handle_broadcast(&ServerMessage::monitoring_stopped("test"));

        assert_eq!(actor.state.total_connections, 2);
        assert!(!actor.connections.contains_key(&ConnectionId::new(2)));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_to_full_queue_keeps_connection() {
        let mut actor = make_actor();

        let (tx, mut rx) = make_outbound(1);
        actor.handle_register(ConnectionId::new(1), tx);

        actor.handle_broadcast(&ServerMessage::monitoring_started("first"));
        actor.handle_broadcast(&ServerMessage::monitoring_started("second"));

        // Slow consumer lost the second message but stays registered
        assert_eq!(actor.state.total_connections, 1);
        let line = rx.try_recv().unwrap();
        assert!(line.contains("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_with_no_connections_is_a_no_op() {
        let mut actor = make_actor();
        actor.handle_broadcast(&ServerMessage::pong());
        assert_eq!(actor.state.total_connections, 0);
        assert!(actor.state.last_update.is_none());
    }

    #[test]
    fn test_set_monitoring_mutates_flag_and_timestamp() {
        let mut actor = make_actor();

        actor.handle_set_monitoring(true);
        assert!(actor.state.is_monitoring);
        let first = actor.state.last_update;
        assert!(first.is_some());

        actor.handle_set_monitoring(false);
        assert!(!actor.state.is_monitoring);
        assert!(actor.state.last_update >= first);
    }

    #[test]
    fn test_snapshot_is_a_detached_copy() {
        let mut actor = make_actor();
        let (tx, _rx) = make_outbound(4);
        actor.handle_register(ConnectionId::new(1), tx);

        let snapshot = actor.state.clone();
        let (tx2, _rx2) = make_outbound(4);
        actor.handle_register(ConnectionId::new(2), tx2);

        assert_eq!(snapshot.total_connections, 1);
        assert_eq!(actor.state.total_connections, 2);
    }
}
