//! Registry actor commands, errors, and removal reasons.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RemovalReason`: Why a connection left, for log lines
//! - `Visitor`: Callback run against each member by `ForEach`

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use super::client::{ClientHandle, ClientInfo, ConnectionId};

// ============================================================================
// Visitor
// ============================================================================

/// What a visitor wants done with the member it just visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Evict,
}

/// Callback executed by the actor once per registered client.
///
/// The visitor gets exclusive access to each handle in turn, so it can
/// write to the socket. Returning [`Visit::Evict`] removes the handle being
/// visited; the rest of the walk is unaffected.
#[async_trait]
pub trait Visitor: Send {
    async fn visit(&mut self, client: &mut ClientHandle) -> Visit;
}

/// Outcome of a `ForEach` walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitSummary {
    /// Number of members visited
    pub visited: usize,

    /// Members removed because the visitor asked for it
    pub evicted: Vec<ClientInfo>,
}

impl VisitSummary {
    /// Members that were visited and are still registered.
    pub fn kept(&self) -> usize {
        self.visited.saturating_sub(self.evicted.len())
    }
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
pub enum RegistryCommand {
    /// Register a freshly accepted connection.
    ///
    /// # Errors
    /// - `RegistryError::DuplicateConnection` if the ID is already registered
    Add {
        /// The connection to register (boxed to keep the enum small)
        client: Box<ClientHandle>,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a connection. Responds with the removed client, or `None` if
    /// it was already gone.
    Remove {
        id: ConnectionId,
        reason: RemovalReason,
        respond_to: oneshot::Sender<Option<ClientInfo>>,
    },

    /// Run a visitor over every registered connection.
    ForEach {
        visitor: Box<dyn Visitor>,
        respond_to: oneshot::Sender<VisitSummary>,
    },

    /// Number of registered connections.
    Len { respond_to: oneshot::Sender<usize> },

    /// Snapshot of all registered connections, in connection order.
    List {
        respond_to: oneshot::Sender<Vec<ClientInfo>>,
    },

    /// Drop every connection (listener shutdown). Responds with the count.
    Clear { respond_to: oneshot::Sender<usize> },
}

impl fmt::Debug for RegistryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { client, .. } => f.debug_struct("Add").field("client", client).finish(),
            Self::Remove { id, reason, .. } => f
                .debug_struct("Remove")
                .field("id", id)
                .field("reason", reason)
                .finish(),
            Self::ForEach { .. } => f.write_str("ForEach"),
            Self::Len { .. } => f.write_str("Len"),
            Self::List { .. } => f.write_str("List"),
            Self::Clear { .. } => f.write_str("Clear"),
        }
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A connection with this ID is already registered.
    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Removal Reasons
// ============================================================================

/// Reason why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// A visitor (the broadcaster) failed to write to it.
    Evicted,

    /// The close watcher saw a read error (usually a reset).
    PeerClosed,

    /// Removed by an explicit `remove` call.
    Explicit,

    /// The listener is shutting down.
    Shutdown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evicted => write!(f, "write failed"),
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::Explicit => write!(f, "explicitly removed"),
            Self::Shutdown => write!(f, "server shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn test_info(id: u64) -> ClientInfo {
        let (near, _far) = tokio::io::duplex(8);
        ClientHandle::new(
            ConnectionId::new(id),
            SocketAddr::from(([127, 0, 0, 1], 50000)),
            Box::new(near),
        )
        .info()
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::DuplicateConnection(ConnectionId::new(4));
        assert_eq!(err.to_string(), "connection already registered: conn-4");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Evicted.to_string(), "write failed");
        assert_eq!(
            RemovalReason::PeerClosed.to_string(),
            "peer closed the connection"
        );
        assert_eq!(RemovalReason::Explicit.to_string(), "explicitly removed");
        assert_eq!(RemovalReason::Shutdown.to_string(), "server shutting down");
    }

    #[test]
    fn test_visit_summary_kept() {
        let summary = VisitSummary {
            visited: 3,
            evicted: vec![test_info(1)],
        };
        assert_eq!(summary.kept(), 2);
        assert_eq!(VisitSummary::default().kept(), 0);
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        // Verify behavior when channel is dropped
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();

        drop(tx);

        let result = rx.await;
        assert!(result.is_err());
    }
}
