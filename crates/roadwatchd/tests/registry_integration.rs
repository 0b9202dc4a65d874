//! Integration tests for the connection registry.
//!
//! These tests exercise the registry through its public handle:
//! register/unregister bookkeeping, broadcast fan-out with failure
//! isolation, and monitoring state snapshots.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free policy
//! applies to production code only.

use std::time::Duration;

use roadwatch_core::ConnectionId;
use roadwatch_protocol::ServerMessage;
use roadwatchd::registry::{spawn_registry, OutboundSender, RegistryHandle};
use tokio::sync::mpsc;
use tokio::time::sleep;

// ============================================================================
// Test Helpers
// ============================================================================

/// Creates a fake connection: an outbound queue whose receiving side
/// stands in for the writer task.
fn fake_connection() -> (OutboundSender, mpsc::Receiver<String>) {
    mpsc::channel(8)
}

/// Registers `count` fake connections starting at id 0.
async fn register_fake_connections(
    registry: &RegistryHandle,
    count: u64,
) -> Vec<mpsc::Receiver<String>> {
    let mut receivers = Vec::new();
    for n in 0..count {
        let (tx, rx) = fake_connection();
        registry
            .register(ConnectionId::new(n), tx)
            .await
            .expect("register connection");
        receivers.push(rx);
    }
    receivers
}

/// Parses an outbound line as a server message.
fn parse_line(line: &str) -> ServerMessage {
    serde_json::from_str(line).expect("valid server message")
}

// ============================================================================
// Register / Unregister Tests
// ============================================================================

#[tokio::test]
async fn test_initial_state() {
    let registry = spawn_registry();

    let state = registry.snapshot().await;
    assert_eq!(state.total_connections, 0);
    assert!(!state.is_monitoring);
    assert!(state.last_update.is_none());
}

#[tokio::test]
async fn test_connection_count_tracks_live_set() {
    let registry = spawn_registry();

    let _receivers = register_fake_connections(&registry, 3).await;
    assert_eq!(registry.snapshot().await.total_connections, 3);

    registry
        .unregister(ConnectionId::new(1))
        .await
        .expect("unregister");
    assert_eq!(registry.snapshot().await.total_connections, 2);
}

#[tokio::test]
async fn test_double_unregister_is_a_no_op() {
    let registry = spawn_registry();

    let _receivers = register_fake_connections(&registry, 2).await;

    registry.unregister(ConnectionId::new(0)).await.unwrap();
    registry.unregister(ConnectionId::new(0)).await.unwrap();
    registry.unregister(ConnectionId::new(42)).await.unwrap();

    assert_eq!(registry.snapshot().await.total_connections, 1);
}

#[tokio::test]
async fn test_register_touches_last_update() {
    let registry = spawn_registry();
    assert!(registry.snapshot().await.last_update.is_none());

    let _receivers = register_fake_connections(&registry, 1).await;
    assert!(registry.snapshot().await.last_update.is_some());
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_reaches_every_connection() {
    let registry = spawn_registry();
    let mut receivers = register_fake_connections(&registry, 3).await;

    registry
        .broadcast(ServerMessage::monitoring_started("Monitoring started from API"))
        .await;

    for rx in receivers.iter_mut() {
        let line = rx.try_recv().expect("broadcast delivered");
        match parse_line(&line) {
            ServerMessage::MonitoringStarted { message } => {
                assert_eq!(message, "Monitoring started from API");
            }
            other => panic!("Expected MonitoringStarted, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_broadcast_isolates_failing_connection() {
    let registry = spawn_registry();
    let mut receivers = register_fake_connections(&registry, 4).await;

    // Kill one transport: dropping the receiving side closes the queue
    let dead = receivers.remove(2);
    drop(dead);

    registry
        .broadcast(ServerMessage::monitoring_stopped("Monitoring stopped from API"))
        .await;

    // The three healthy connections all got the message
    for rx in receivers.iter_mut() {
        assert!(rx.try_recv().is_ok(), "healthy connection missed broadcast");
    }

    // Exactly the failing one was removed
    assert_eq!(registry.snapshot().await.total_connections, 3);
}

#[tokio::test]
async fn test_broadcast_with_no_connections_does_not_error() {
    let registry = spawn_registry();
    registry.broadcast(ServerMessage::pong()).await;
    assert_eq!(registry.snapshot().await.total_connections, 0);
}

#[tokio::test]
async fn test_dead_connection_removed_once_count_stays_stable() {
    let registry = spawn_registry();
    let mut receivers = register_fake_connections(&registry, 2).await;

    drop(receivers.remove(0));

    registry.broadcast(ServerMessage::pong()).await;
    assert_eq!(registry.snapshot().await.total_connections, 1);

    // A second broadcast finds no further casualties
    registry.broadcast(ServerMessage::pong()).await;
    assert_eq!(registry.snapshot().await.total_connections, 1);
}

// ============================================================================
// Monitoring State Tests
// ============================================================================

#[tokio::test]
async fn test_set_monitoring_advances_last_update() {
    let registry = spawn_registry();

    let _receivers = register_fake_connections(&registry, 1).await;
    let before = registry.snapshot().await;

    // Ensure the clock can observably advance
    sleep(Duration::from_millis(2)).await;

    registry.set_monitoring(true).await.expect("set monitoring");
    let after = registry.snapshot().await;

    assert!(after.is_monitoring);
    assert!(
        after.last_update.unwrap() > before.last_update.unwrap(),
        "last_update should be strictly greater after the mutation"
    );
}

#[tokio::test]
async fn test_set_monitoring_off() {
    let registry = spawn_registry();

    registry.set_monitoring(true).await.unwrap();
    registry.set_monitoring(false).await.unwrap();

    let state = registry.snapshot().await;
    assert!(!state.is_monitoring);
    assert!(state.last_update.is_some());
}

#[tokio::test]
async fn test_snapshot_is_consistent_copy() {
    let registry = spawn_registry();

    let _receivers = register_fake_connections(&registry, 1).await;
    let snapshot = registry.snapshot().await;

    let (tx, _rx) = fake_connection();
    registry.register(ConnectionId::new(100), tx).await.unwrap();

    // The earlier snapshot does not see the later mutation
    assert_eq!(snapshot.total_connections, 1);
    assert_eq!(registry.snapshot().await.total_connections, 2);
}

// ============================================================================
// Independent Registries
// ============================================================================

#[tokio::test]
async fn test_registries_are_independent() {
    let a = spawn_registry();
    let b = spawn_registry();

    let _receivers = register_fake_connections(&a, 2).await;
    a.set_monitoring(true).await.unwrap();

    let state_b = b.snapshot().await;
    assert_eq!(state_b.total_connections, 0);
    assert!(!state_b.is_monitoring);
}
