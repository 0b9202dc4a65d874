//! Roadwatch core - shared domain types for the monitoring hub.
//!
//! This crate provides the types shared between the daemon (roadwatchd)
//! and any collaborator that queries or mutates monitoring state.

pub mod connection;
pub mod state;

// Re-exports for convenience
pub use connection::ConnectionId;
pub use state::MonitoringState;
