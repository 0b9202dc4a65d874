//! Connection registry using the actor pattern.
//!
//! The registry is the single source of truth for which clients are
//! connected and what the shared monitoring state is. It receives commands
//! via a tokio mpsc channel and processes them sequentially in one task,
//! which serializes every read and write of the connection set and state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ session handler │────▶│  RegistryActor  │────▶│ outbound queues  │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                        │
//!         │   RegistryCommand     │   try_send fan-out     │
//!         │   (mpsc channel)      │   per connection       ▼
//!         ▼                       ▼                 writer tasks drain
//!    register/unregister    HashMap<ConnectionId,  queues onto sockets
//!    broadcast/snapshot     OutboundSender>
//! ```
//!
//! There is no process-global registry: callers construct one explicitly
//! via [`spawn_registry`] and pass the handle to whatever accepts
//! connections, which also lets tests run any number of independent
//! registries.

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{OutboundSender, RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawns the registry actor and returns a handle for interaction.
///
/// # Example
///
/// ```no_run
/// use roadwatchd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///
///     let state = registry.snapshot().await;
///     assert_eq!(state.total_connections, 0);
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
