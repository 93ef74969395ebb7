//! Fan-out of bell events to every registered client.
//!
//! The broadcaster walks the registry with a visitor that writes one frame
//! per client. A client whose write fails or stalls past the deadline is
//! evicted on the spot; delivery to the others carries on.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pibell_core::config::DEFAULT_WRITE_TIMEOUT_MS;
use pibell_protocol::BellEvent;

use crate::registry::{ClientHandle, RegistryError, RegistryHandle, Visit, Visitor};

/// Per-client write deadline used when none is configured.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS);

/// Result of one [`Broadcaster::notify`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that received the whole frame
    pub delivered: usize,

    /// Clients removed because the write failed
    pub evicted: usize,
}

/// Sends [`BellEvent::BellPressed`] to all connected clients.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
    write_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Delivers one bell event to every registered client.
    ///
    /// Never fails: write errors turn into evictions, and a stopped registry
    /// is logged and reported as an empty broadcast.
    pub async fn notify(&self) -> BroadcastReport {
        let visitor = DeliveryVisitor {
            frame: BellEvent::BellPressed.encode(),
            write_timeout: self.write_timeout,
        };

        match self.registry.for_each(Box::new(visitor)).await {
            Ok(summary) => {
                let report = BroadcastReport {
                    delivered: summary.kept(),
                    evicted: summary.evicted.len(),
                };
                info!(
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "Bell event broadcast"
                );
                report
            }
            Err(RegistryError::ChannelClosed) => {
                warn!("Registry stopped, bell event not delivered");
                BroadcastReport::default()
            }
            Err(e) => {
                warn!(error = %e, "Broadcast failed");
                BroadcastReport::default()
            }
        }
    }
}

/// Writes one frame per client and asks for eviction on failure.
struct DeliveryVisitor {
    frame: &'static [u8],
    write_timeout: Duration,
}

#[async_trait]
impl Visitor for DeliveryVisitor {
    async fn visit(&mut self, client: &mut ClientHandle) -> Visit {
        match client.send(self.frame, self.write_timeout).await {
            Ok(()) => {
                debug!(connection_id = %client.id(), peer = %client.peer(), "Delivered");
                Visit::Keep
            }
            Err(e) => {
                warn!(
                    connection_id = %client.id(),
                    peer = %client.peer(),
                    error = %e,
                    "Dropping unreachable client"
                );
                Visit::Evict
            }
        }
    }
}
