//! TCP listen server for the pibell daemon.
//!
//! The server:
//! - Resolves and binds the listen address
//! - Accepts client connections and enables TCP keep-alive on each
//! - Registers every connection with the registry and watches it for close
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  ListenServer   │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  close watcher  │────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//!                                 ▲
//!                                 │ for_each
//!                         ┌─────────────────┐
//!                         │   Broadcaster   │
//!                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{enable_keepalive, spawn_close_watcher};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pibell_core::Address;

use crate::registry::{ClientHandle, ConnectionId, RegistryHandle};

/// Accepts clients and hands them to the registry.
pub struct ListenServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves ephemeral port 0)
    local_addr: SocketAddr,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl ListenServer {
    /// Resolves `address` and binds a listener on it.
    ///
    /// Every resolved socket address is tried in order; the first that binds
    /// wins.
    ///
    /// # Errors
    ///
    /// - `ServerError::Resolve` if the host does not resolve
    /// - `ServerError::Bind` if no resolved address can be bound
    pub async fn bind(
        address: &Address,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let candidates: Vec<SocketAddr> = lookup_host((address.host(), address.port()))
            .await
            .map_err(|source| ServerError::Resolve {
                address: address.to_string(),
                source,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(ServerError::Resolve {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let mut last_error = None;
        for candidate in candidates {
            match TcpListener::bind(candidate).await {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
                        address: address.to_string(),
                        source,
                    })?;
                    return Ok(Self {
                        listener,
                        local_addr,
                        registry,
                        cancel_token,
                        connection_counter: AtomicU64::new(0),
                    });
                }
                Err(e) => {
                    debug!(candidate = %candidate, error = %e, "Bind attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ServerError::Bind {
            address: address.to_string(),
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address")),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the registry this server feeds.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Runs the accept loop.
    ///
    /// Listens for connections until the cancellation token is triggered,
    /// then drops every registered connection.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "Listening for clients");

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            self.handle_connection(stream, peer);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Registers a new connection and starts its close watcher.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let id = ConnectionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));

        if let Err(e) = enable_keepalive(&stream) {
            warn!(connection_id = %id, peer = %peer, error = %e, "Failed to enable keep-alive");
        }

        let (reader, writer) = stream.into_split();
        let client = ClientHandle::new(id, peer, Box::new(writer));
        let registry = self.registry.clone();
        let cancel = self.cancel_token.clone();

        debug!(connection_id = %id, peer = %peer, "Accepted connection");

        // Registration can wait behind a running broadcast, so it happens
        // off the accept loop. The watcher only starts once the add landed.
        tokio::spawn(async move {
            match registry.add(client).await {
                Ok(()) => {
                    spawn_close_watcher(id, reader, registry, cancel);
                }
                Err(e) => {
                    warn!(connection_id = %id, peer = %peer, error = %e, "Rejecting connection");
                }
            }
        });
    }

    /// Performs cleanup on shutdown.
    async fn cleanup(&self) {
        let dropped = self.registry.clear().await;
        info!(dropped, "Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to resolve listen address {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}
