//! Server-side record of one accepted connection.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Write side of a client connection.
///
/// Boxed so the registry does not care whether it holds a TCP write half or
/// an in-memory pipe.
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Unique identifier for an accepted connection, assigned by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a write to a client did not complete.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The peer did not drain its receive buffer within the deadline.
    /// Part of the frame may already be on the wire.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// One connected client, owned by the registry actor.
///
/// Only the write half lives here; the read half belongs to the
/// connection's close watcher.
pub struct ClientHandle {
    id: ConnectionId,
    peer: SocketAddr,
    connected_at: DateTime<Utc>,
    writer: PeerWriter,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, peer: SocketAddr, writer: PeerWriter) -> Self {
        Self {
            id,
            peer,
            connected_at: Utc::now(),
            writer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Writes a complete frame and flushes it, bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteFailure`] if the write errors or does not finish in
    /// time. Either way the frame may have been partially written, so the
    /// caller should treat the client as unreachable.
    pub async fn send(&mut self, frame: &[u8], deadline: Duration) -> Result<(), WriteFailure> {
        let writer = &mut self.writer;
        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };

        match timeout(deadline, write).await {
            Ok(result) => result.map_err(WriteFailure::Io),
            Err(_) => Err(WriteFailure::Timeout(deadline)),
        }
    }

    /// Snapshot of this client's metadata.
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            peer: self.peer,
            connected_at: self.connected_at,
        }
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

impl ClientInfo {
    /// How long the client has been connected, for log lines.
    pub fn connected_for(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.connected_at)
    }
}
