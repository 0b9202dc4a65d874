//! Roadwatch daemon - connection registry and broadcast server
//!
//! This crate provides the core infrastructure for the roadwatch hub:
//! - `registry` - Connection registry actor owning the live connection set
//!   and the shared monitoring state
//! - `server` - TCP server accepting persistent client connections
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     roadwatchd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │    HubServer    │────▶│       RegistryActor         │   │
//! │  │  (TCP accept)   │     │ (connection set + state)    │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │ spawn per client            │ fan-out           │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │  per-connection outbound    │   │
//! │  │  (read loop)    │     │  queues (writer tasks)      │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A collaborator (for example an HTTP layer exposing REST endpoints) holds
//! a [`registry::RegistryHandle`] and uses `snapshot`, `set_monitoring`,
//! and `broadcast` directly; the wire protocol is merely one consumer of
//! the same registry surface.
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate avoids `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, and `todo!()`. Fallible operations use
//! `?`, pattern matching, or `unwrap_or`, and channel operations handle
//! closure gracefully.

pub mod registry;
pub mod server;
