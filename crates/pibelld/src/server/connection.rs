//! Per-connection plumbing for accepted clients.
//!
//! Clients never send application data, so the read half is only drained.
//! End-of-stream is a half-close: the peer may still be reading, so the
//! handle stays registered and the next failed write evicts it. A read error
//! (usually a reset) means the connection is gone and it is removed at once.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Read errors are logged and end the watcher

use std::io;

use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::{ConnectionId, RegistryHandle, RemovalReason};

/// Scratch buffer for draining unexpected client bytes.
const DRAIN_BUFFER_SIZE: usize = 256;

/// Turns on SO_KEEPALIVE so dead peers are eventually detected by the kernel.
pub fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    SockRef::from(stream).set_keepalive(true)
}

/// Spawns a task that drains `reader` and removes `id` on a read error.
///
/// Bytes the client sends are discarded. On end-of-stream the task stops
/// without touching the registry. It also exits quietly when `cancel` fires,
/// since shutdown clears the registry itself.
pub fn spawn_close_watcher<R>(
    id: ConnectionId,
    mut reader: R,
    registry: RegistryHandle,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; DRAIN_BUFFER_SIZE];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(connection_id = %id, "Close watcher stopping for shutdown");
                    return;
                }

                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            debug!(connection_id = %id, "Peer half-closed, still registered");
                            return;
                        }
                        Ok(n) => {
                            debug!(
                                connection_id = %id,
                                bytes = n,
                                "Discarding unexpected client data"
                            );
                        }
                        Err(e) => {
                            debug!(
                                connection_id = %id,
                                error = %e,
                                "Read error on client connection"
                            );
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = registry.remove(id, RemovalReason::PeerClosed).await {
            warn!(connection_id = %id, error = %e, "Failed to remove closed connection");
        }
    })
}
