//! Reconnecting bell listener.
//!
//! This module provides the `ResilientClient` which handles:
//! - Connection to the daemon over TCP
//! - Reconnection after a clean close (immediately) or an I/O error (after a
//!   fixed backoff)
//! - Parsing bell events and forwarding them to a [`NotificationSink`]
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pibell_core::config::{ClientSection, DEFAULT_BACKOFF_SECS};
use pibell_core::Address;
use pibell_protocol::{BellCodec, BellEvent};
use socket2::SockRef;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::sink::NotificationSink;
use crate::state::SessionState;

/// Text passed to [`NotificationSink::create_alarm`] for a bell press.
pub const ALARM_MESSAGE: &str = "The doorbell rang";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a client session.
///
/// # Example
///
/// ```rust
/// use pibell_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     backoff: Duration::from_secs(5),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Delay before reconnecting after an I/O error.
    pub backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

impl From<&ClientSection> for ClientConfig {
    fn from(section: &ClientSection) -> Self {
        Self {
            backoff: section.backoff(),
        }
    }
}

// ============================================================================
// Resilient Client
// ============================================================================

/// A running client session.
///
/// Created with [`ResilientClient::start`], which spawns the session task
/// immediately. The session keeps reconnecting until it hits a permanent
/// error, [`close`](Self::close) is called, or the `shutdown` token passed to
/// `start` is cancelled. Dropping the client closes it.
///
/// # Example
///
/// ```rust,ignore
/// use pibell_client::{ClientConfig, ResilientClient, TracingSink};
/// use pibell_core::Address;
/// use tokio_util::sync::CancellationToken;
///
/// let address = Address::parse("raspberrypi.local:12321")?;
/// let client = ResilientClient::start(
///     address,
///     TracingSink,
///     ClientConfig::default(),
///     CancellationToken::new(),
/// );
///
/// // Later, from the UI
/// client.close();
/// client.closed().await;
/// ```
#[derive(Debug)]
pub struct ResilientClient {
    address: Address,
    close: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl ResilientClient {
    /// Starts a session towards `address`.
    ///
    /// # Arguments
    ///
    /// * `address` - Server to connect to
    /// * `sink` - Receives one callback per state change plus one per bell
    /// * `config` - Reconnect behaviour
    /// * `shutdown` - Process-wide shutdown; also interrupts backoff
    pub fn start<S>(
        address: Address,
        sink: S,
        config: ClientConfig,
        shutdown: CancellationToken,
    ) -> Self
    where
        S: NotificationSink + 'static,
    {
        let close = shutdown.child_token();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let session = Session {
            address: address.clone(),
            sink: Arc::new(sink),
            config,
            shutdown,
            close: close.clone(),
            state: state_tx,
        };
        tokio::spawn(session.run());

        Self {
            address,
            close,
            state: state_rx,
        }
    }

    /// The server this session connects to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Stops the session for good.
    ///
    /// An open connection is closed at once and its read error is not
    /// reported. During backoff the session finishes the delay first and
    /// then closes instead of reconnecting.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch channel following every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the session has reached [`SessionState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // Err means the session task is gone, which only happens after Closed
        let _ = state.wait_for(SessionState::is_closed).await;
    }
}

impl Drop for ResilientClient {
    fn drop(&mut self) {
        self.close.cancel();
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Sink output that accompanies a state change.
enum Notice {
    Log(String),
    Error(String),
    Success(String),
}

/// How an established connection ended.
enum ReadEnd {
    /// The server closed the stream.
    PeerClosed,

    /// Close or shutdown was requested.
    Stopped,

    Failed(ClientError),
}

/// State owned by the spawned session task.
struct Session {
    address: Address,
    sink: Arc<dyn NotificationSink>,
    config: ClientConfig,
    shutdown: CancellationToken,
    close: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl Session {
    async fn run(self) {
        info!(address = %self.address, "Client session starting");

        loop {
            self.enter(
                SessionState::Connecting,
                Notice::Log(format!("Connecting to {}", self.address)),
            );

            let attempt = tokio::select! {
                biased;
                _ = self.close.cancelled() => None,
                result = self.connect() => Some(result),
            };

            let stream = match attempt {
                None => return self.stop(),
                Some(Ok(stream)) => stream,
                Some(Err(e)) if e.is_retryable() => {
                    if self.backoff(e).await {
                        continue;
                    }
                    return;
                }
                Some(Err(e)) => return self.fail(e),
            };

            self.enter(
                SessionState::Connected,
                Notice::Success(format!("Connected to {}", self.address)),
            );

            match self.read_events(stream).await {
                ReadEnd::PeerClosed => {
                    self.enter(
                        SessionState::Disconnected,
                        Notice::Log(format!(
                            "Server {} closed the connection, reconnecting",
                            self.address
                        )),
                    );
                }
                ReadEnd::Stopped => return self.stop(),
                ReadEnd::Failed(e) if e.is_retryable() => {
                    if !self.backoff(e).await {
                        return;
                    }
                }
                ReadEnd::Failed(e) => return self.fail(e),
            }
        }
    }

    /// Records a state change and emits its single notification.
    fn enter(&self, state: SessionState, notice: Notice) {
        debug!(address = %self.address, state = %state, "Session state change");
        self.state.send_replace(state);

        match notice {
            Notice::Log(m) => self.sink.write_log(&m),
            Notice::Error(m) => self.sink.write_error(&m),
            Notice::Success(m) => self.sink.write_success(&m),
        }
    }

    /// Terminal state after a permanent error.
    fn fail(&self, cause: ClientError) {
        warn!(address = %self.address, error = %cause, "Client session failed");
        self.enter(SessionState::Closed, Notice::Error(cause.to_string()));
    }

    /// Terminal state after close or shutdown.
    fn stop(&self) {
        let message = if self.shutdown.is_cancelled() {
            "Shutting down".to_string()
        } else {
            format!("Connection to {} closed", self.address)
        };
        info!(address = %self.address, "Client session closed");
        self.enter(SessionState::Closed, Notice::Log(message));
    }

    /// Waits out the retry delay. Returns false if the session ended.
    ///
    /// Only process shutdown cuts the delay short. A `close()` that arrives
    /// meanwhile is honoured once the delay is over.
    async fn backoff(&self, cause: ClientError) -> bool {
        let delay = self.config.backoff;
        self.enter(
            SessionState::Backoff,
            Notice::Error(format!(
                "{cause}. Retrying in {} seconds",
                delay.as_secs()
            )),
        );

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                self.stop();
                return false;
            }
            _ = sleep(delay) => {}
        }

        if self.close.is_cancelled() {
            self.stop();
            return false;
        }
        true
    }

    /// Resolves the host and connects to the first address that accepts.
    async fn connect(&self) -> Result<TcpStream> {
        let address = self.address.to_string();

        let candidates: Vec<SocketAddr> = lookup_host((self.address.host(), self.address.port()))
            .await
            .map_err(|source| ClientError::Resolve {
                address: address.clone(),
                source,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(ClientError::Resolve {
                address,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect(candidate).await {
                Ok(stream) => {
                    if let Err(e) = SockRef::from(&stream).set_keepalive(true) {
                        warn!(error = %e, "Failed to enable keep-alive");
                    }
                    debug!(peer = %candidate, "Connection successful");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(peer = %candidate, error = %e, "Connection attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ClientError::Connect {
            address,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address")),
        })
    }

    /// Reads bell events until the connection ends.
    ///
    /// Returning drops the stream, which closes the socket.
    async fn read_events(&self, stream: TcpStream) -> ReadEnd {
        let mut frames = FramedRead::new(stream, BellCodec::new());

        loop {
            tokio::select! {
                biased;
                _ = self.close.cancelled() => return ReadEnd::Stopped,

                frame = frames.next() => match frame {
                    Some(Ok(BellEvent::BellPressed)) => {
                        debug!(address = %self.address, "Bell event received");
                        self.sink.create_alarm(ALARM_MESSAGE);
                    }
                    None => return ReadEnd::PeerClosed,
                    Some(Err(e)) => {
                        if self.close.is_cancelled() {
                            return ReadEnd::Stopped;
                        }
                        return ReadEnd::Failed(ClientError::from(e));
                    }
                },
            }
        }
    }
}
