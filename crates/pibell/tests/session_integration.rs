//! Integration tests for the client session against a real daemon.
//!
//! These tests run the pibelld listen server in-process on an ephemeral port
//! and drive one or more ResilientClients against it.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::net::SocketAddr;
use std::time::Duration;

use pibell_client::{ClientConfig, Notification, ResilientClient, SessionState, ALARM_MESSAGE};
use pibell_core::Address;
use pibelld::registry::{spawn_registry, RegistryHandle};
use pibelld::server::ListenServer;
use pibelld::{Broadcaster, DEFAULT_WRITE_TIMEOUT};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const WAIT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestDaemon {
    address: Address,
    registry: RegistryHandle,
    broadcaster: Broadcaster,
    cancel_token: CancellationToken,
}

impl TestDaemon {
    async fn spawn() -> Self {
        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let listen = Address::parse_listen("127.0.0.1:0").unwrap();

        let server = ListenServer::bind(&listen, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test daemon");
        let address = Address::parse(&server.local_addr().to_string()).unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            address,
            broadcaster: Broadcaster::new(registry.clone(), DEFAULT_WRITE_TIMEOUT),
            registry,
            cancel_token,
        }
    }

    async fn wait_for_clients(&self, expected: usize) {
        let start = Instant::now();
        while start.elapsed() < WAIT {
            if self.registry.len().await == expected {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!("daemon never reached {expected} clients");
    }

    /// Rings until writes to departed clients have failed and evicted them.
    async fn evict_until(&self, expected: usize) {
        let start = Instant::now();
        while start.elapsed() < WAIT {
            self.broadcaster.notify().await;
            if self.registry.len().await == expected {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!("daemon never shrank to {expected} clients");
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn start_client(
    address: Address,
    config: ClientConfig,
    shutdown: CancellationToken,
) -> (ResilientClient, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResilientClient::start(address, tx, config, shutdown), rx)
}

async fn next_alarm(rx: &mut mpsc::UnboundedReceiver<Notification>) {
    loop {
        match timeout(WAIT, rx.recv()).await.expect("alarm in time") {
            Some(Notification::Alarm(m)) => {
                assert_eq!(m, ALARM_MESSAGE);
                return;
            }
            Some(_) => continue,
            None => panic!("sink closed before alarm"),
        }
    }
}

async fn wait_for_state(client: &ResilientClient, expected: SessionState) {
    let mut rx = client.subscribe();
    timeout(WAIT, rx.wait_for(|s| *s == expected))
        .await
        .unwrap_or_else(|_| panic!("never reached {expected}"))
        .unwrap();
}

/// An address on which nothing is listening.
async fn refused_address() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    Address::parse(&addr.to_string()).unwrap()
}

/// Drains notifications that are already queued.
fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(n) = rx.try_recv() {
        seen.push(n);
    }
    seen
}

fn count_connecting(seen: &[Notification]) -> usize {
    seen.iter()
        .filter(|n| matches!(n, Notification::Log(m) if m.starts_with("Connecting to")))
        .count()
}

// ============================================================================
// End-to-End Tests
// ============================================================================

#[tokio::test]
async fn test_two_clients_both_alarm() {
    let daemon = TestDaemon::spawn().await;
    let shutdown = CancellationToken::new();

    let (a, mut a_rx) =
        start_client(daemon.address.clone(), ClientConfig::default(), shutdown.clone());
    let (b, mut b_rx) =
        start_client(daemon.address.clone(), ClientConfig::default(), shutdown.clone());
    daemon.wait_for_clients(2).await;

    let report = daemon.broadcaster.notify().await;
    assert_eq!(report.delivered, 2);

    next_alarm(&mut a_rx).await;
    next_alarm(&mut b_rx).await;
    assert_eq!(a.state(), SessionState::Connected);
    assert_eq!(b.state(), SessionState::Connected);

    shutdown.cancel();
}

#[tokio::test]
async fn test_closed_client_leaves_one_registered() {
    let daemon = TestDaemon::spawn().await;
    let shutdown = CancellationToken::new();

    let (stays, mut stays_rx) =
        start_client(daemon.address.clone(), ClientConfig::default(), shutdown.clone());
    let (leaves, _leaves_rx) =
        start_client(daemon.address.clone(), ClientConfig::default(), shutdown.clone());
    daemon.wait_for_clients(2).await;

    leaves.close();
    timeout(WAIT, leaves.closed()).await.unwrap();
    daemon.evict_until(1).await;

    next_alarm(&mut stays_rx).await;
    assert_eq!(daemon.registry.len().await, 1);
    assert_eq!(stays.state(), SessionState::Connected);

    shutdown.cancel();
}

#[tokio::test]
async fn test_daemon_restart_is_followed() {
    let daemon = TestDaemon::spawn().await;
    let shutdown = CancellationToken::new();
    let (client, _rx) =
        start_client(daemon.address.clone(), ClientConfig::default(), shutdown.clone());
    daemon.wait_for_clients(1).await;

    // Shutdown clears the registry, which closes the client's stream cleanly
    let address = daemon.address.clone();
    drop(daemon);

    let mut states = client.subscribe();
    timeout(WAIT, states.wait_for(|s| *s != SessionState::Connected))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(*states.borrow(), SessionState::Closed);
    assert_eq!(client.address(), &address);

    shutdown.cancel();
}

// ============================================================================
// Backoff Tests
// ============================================================================

#[tokio::test]
async fn test_refused_connect_enters_backoff_then_retries() {
    let address = refused_address().await;
    let shutdown = CancellationToken::new();
    let config = ClientConfig {
        backoff: Duration::from_millis(200),
    };
    let (client, mut rx) = start_client(address, config, shutdown.clone());

    wait_for_state(&client, SessionState::Backoff).await;
    let entered_backoff = Instant::now();

    // Next attempt only after the delay
    let mut states = client.subscribe();
    states.borrow_and_update();
    timeout(WAIT, states.wait_for(|s| *s == SessionState::Connecting))
        .await
        .unwrap()
        .unwrap();
    assert!(entered_backoff.elapsed() >= Duration::from_millis(150));

    wait_for_state(&client, SessionState::Backoff).await;
    let seen = drain(&mut rx);
    assert!(count_connecting(&seen) >= 2);
    assert!(seen
        .iter()
        .any(|n| matches!(n, Notification::Error(m) if m.contains("Retrying in"))));

    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_close_during_backoff_ends_closed_without_reconnect() {
    let address = refused_address().await;
    let shutdown = CancellationToken::new();
    let (client, mut rx) = start_client(address, ClientConfig::default(), shutdown.clone());

    let mut states = client.subscribe();
    states
        .wait_for(|s| *s == SessionState::Backoff)
        .await
        .unwrap();

    client.close();
    // Nothing happens before the 30 s delay is up
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(client.state(), SessionState::Backoff);

    client.closed().await;

    let seen = drain(&mut rx);
    assert_eq!(count_connecting(&seen), 1);
    assert!(matches!(seen.last(), Some(Notification::Log(m)) if m.ends_with("closed")));
}

#[tokio::test]
async fn test_shutdown_interrupts_backoff() {
    let address = refused_address().await;
    let shutdown = CancellationToken::new();
    let config = ClientConfig {
        backoff: Duration::from_secs(3600),
    };
    let (client, mut rx) = start_client(address, config, shutdown.clone());

    wait_for_state(&client, SessionState::Backoff).await;
    shutdown.cancel();

    timeout(WAIT, client.closed()).await.unwrap();
    let seen = drain(&mut rx);
    assert_eq!(
        seen.last(),
        Some(&Notification::Log("Shutting down".to_string()))
    );
}
