//! Client registry using Actor pattern.
//!
//! The registry is the single owner of every accepted connection. It receives
//! commands via a tokio mpsc channel, so concurrent adds, removals and
//! broadcasts are serialized without a lock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  RegistryCommand   ┌──────────────────────────┐
//! │  ListenServer   │  (mpsc channel)    │      RegistryActor       │
//! │  close watchers │───────────────────▶│                          │
//! │  Broadcaster    │◀───────────────────│  BTreeMap<ConnectionId,  │
//! └─────────────────┘  oneshot replies   │            ClientHandle> │
//!                                        └──────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod client;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use client::{ClientHandle, ClientInfo, ConnectionId, PeerWriter, WriteFailure};
pub use commands::{RegistryCommand, RegistryError, RemovalReason, Visit, VisitSummary, Visitor};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every handle clone has been dropped.
///
/// # Example
///
/// ```no_run
/// use pibelld::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     assert_eq!(handle.len().await, 0);
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
