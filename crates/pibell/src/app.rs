//! Interactive front end: one session at a time, replaced on demand.
//!
//! The user supplies a server address on the command line and may type a
//! new one on stdin at any time. Each new address closes the running
//! session and starts a fresh one. A malformed address is reported through
//! the sink and the app waits for another.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`.

use std::io;
use std::sync::Arc;

use pibell_core::Address;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ClientConfig, ResilientClient};
use crate::sink::NotificationSink;

/// Prompt shown after a bad address.
pub const ADDRESS_PROMPT: &str = "Enter a server address as HOST:PORT";

/// Owns the current session and the sink every session reports to.
pub struct App<S: NotificationSink + 'static> {
    sink: Arc<S>,
    config: ClientConfig,
    shutdown: CancellationToken,
    client: Option<ResilientClient>,
}

impl<S: NotificationSink + 'static> App<S> {
    pub fn new(sink: S, config: ClientConfig, shutdown: CancellationToken) -> Self {
        Self {
            sink: Arc::new(sink),
            config,
            shutdown,
            client: None,
        }
    }

    /// The running session, if any.
    pub fn client(&self) -> Option<&ResilientClient> {
        self.client.as_ref()
    }

    /// Closes the current session and starts one towards `raw`.
    ///
    /// Returns false if `raw` is not a valid address; the previous session
    /// is closed either way.
    pub fn connect(&mut self, raw: &str) -> bool {
        if let Some(previous) = self.client.take() {
            debug!(address = %previous.address(), "Replacing session");
            previous.close();
        }

        match Address::parse(raw) {
            Ok(address) => {
                self.client = Some(ResilientClient::start(
                    address,
                    Arc::clone(&self.sink),
                    self.config.clone(),
                    self.shutdown.clone(),
                ));
                true
            }
            Err(e) => {
                self.sink.write_error(&e.to_string());
                self.sink.write_log(ADDRESS_PROMPT);
                false
            }
        }
    }

    /// Connects to `initial`, then follows addresses typed on `input`.
    ///
    /// Returns on shutdown, or once `input` is exhausted and the current
    /// session (if any) has closed by itself.
    ///
    /// # Errors
    ///
    /// Returns the error from reading `input`.
    pub async fn run<R>(mut self, initial: &str, input: R) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.connect(initial);
        let mut lines = BufReader::new(input).lines();

        let result = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            self.connect(line);
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed, waiting for the session to end");
                        if let Some(client) = &self.client {
                            tokio::select! {
                                _ = client.closed() => {}
                                _ = self.shutdown.cancelled() => {}
                            }
                        }
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        if let Some(client) = self.client.take() {
            client.close();
            client.closed().await;
        }
        result
    }
}
