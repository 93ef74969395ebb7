//! Registry actor - owns every client handle and processes commands.
//!
//! The RegistryActor is the single owner of connection state in the daemon.
//! It receives commands via an mpsc channel and logs every membership change.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::client::{ClientHandle, ClientInfo, ConnectionId};
use super::commands::{RegistryCommand, RegistryError, RemovalReason, Visit, VisitSummary, Visitor};

/// The registry actor - owns all client handles.
///
/// Implements the actor pattern: receives commands via mpsc channel and
/// processes them sequentially. Every accepted connection is admitted; there
/// is no capacity limit.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands one at a time.
/// A `ForEach` walk therefore runs to completion before any queued `Add`
/// or `Remove` is looked at, and never observes the map changing under it
/// except through its own evictions.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Registered clients, ordered by connection ID
    clients: BTreeMap<ConnectionId, ClientHandle>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            clients: BTreeMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// Remaining handles are dropped on exit, which closes their sockets.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(clients = self.clients.len(), "Registry actor stopped");
    }

    /// Returns the number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Dispatches a command to the appropriate handler.
    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Add { client, respond_to } => {
                let result = self.handle_add(*client);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                id,
                reason,
                respond_to,
            } => {
                let result = self.handle_remove(id, reason);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ForEach {
                visitor,
                respond_to,
            } => {
                let summary = self.handle_for_each(visitor).await;
                let _ = respond_to.send(summary);
            }
            RegistryCommand::Len { respond_to } => {
                let _ = respond_to.send(self.clients.len());
            }
            RegistryCommand::List { respond_to } => {
                let list = self.clients.values().map(ClientHandle::info).collect();
                let _ = respond_to.send(list);
            }
            RegistryCommand::Clear { respond_to } => {
                let count = self.handle_clear();
                let _ = respond_to.send(count);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_add(&mut self, client: ClientHandle) -> Result<(), RegistryError> {
        let id = client.id();

        if self.clients.contains_key(&id) {
            debug!(connection_id = %id, "Connection already registered, rejecting");
            return Err(RegistryError::DuplicateConnection(id));
        }

        let peer = client.peer();
        self.clients.insert(id, client);

        info!(
            connection_id = %id,
            peer = %peer,
            total_clients = self.clients.len(),
            "Client registered"
        );

        Ok(())
    }

    fn handle_remove(&mut self, id: ConnectionId, reason: RemovalReason) -> Option<ClientInfo> {
        let Some(client) = self.clients.remove(&id) else {
            debug!(connection_id = %id, %reason, "Remove for unknown connection ignored");
            return None;
        };

        let info = client.info();
        // Dropping the handle closes the write half
        drop(client);

        info!(
            connection_id = %id,
            peer = %info.peer,
            %reason,
            connected_secs = info.connected_for().num_seconds(),
            total_clients = self.clients.len(),
            "Client removed"
        );

        Some(info)
    }

    /// Walks every client exactly once.
    ///
    /// The key set is snapshotted up front, so evicting the current member
    /// cannot shift or skip the others.
    async fn handle_for_each(&mut self, mut visitor: Box<dyn Visitor>) -> VisitSummary {
        let ids: Vec<ConnectionId> = self.clients.keys().copied().collect();
        let mut summary = VisitSummary::default();

        for id in ids {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            summary.visited += 1;

            if visitor.visit(client).await == Visit::Evict {
                if let Some(info) = self.handle_remove(id, RemovalReason::Evicted) {
                    summary.evicted.push(info);
                }
            }
        }

        debug!(
            visited = summary.visited,
            evicted = summary.evicted.len(),
            "ForEach complete"
        );

        summary
    }

    fn handle_clear(&mut self) -> usize {
        let ids: Vec<ConnectionId> = self.clients.keys().copied().collect();
        let count = ids.len();
        for id in ids {
            self.handle_remove(id, RemovalReason::Shutdown);
        }
        count
    }
}
