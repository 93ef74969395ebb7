//! Integration tests for the Registry Actor.
//!
//! These tests verify the registry works correctly as a complete system,
//! testing the spawn_registry() function and RegistryHandle interface.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pibelld::registry::{
    spawn_registry, ClientHandle, ConnectionId, RegistryError, RemovalReason, Visit, Visitor,
};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::time::{sleep, timeout};

// ============================================================================
// Test Helpers
// ============================================================================

/// Helper to create a client handle backed by an in-memory pipe.
fn create_test_client(id: u64) -> (ClientHandle, DuplexStream) {
    let (near, far) = tokio::io::duplex(64);
    let peer = SocketAddr::from(([10, 0, 0, 1], 50000 + (id % 10000) as u16));
    (
        ClientHandle::new(ConnectionId::new(id), peer, Box::new(near)),
        far,
    )
}

/// Visitor that counts visits and evicts every member.
struct EvictAll(Arc<AtomicUsize>);

#[async_trait]
impl Visitor for EvictAll {
    async fn visit(&mut self, _client: &mut ClientHandle) -> Visit {
        self.0.fetch_add(1, Ordering::SeqCst);
        Visit::Evict
    }
}

/// Visitor that takes its time on every member.
struct SlowKeep(Duration);

#[async_trait]
impl Visitor for SlowKeep {
    async fn visit(&mut self, _client: &mut ClientHandle) -> Visit {
        sleep(self.0).await;
        Visit::Keep
    }
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let handle = spawn_registry();
    assert!(handle.is_empty().await);

    let (client, _far) = create_test_client(1);
    handle.add(client).await.unwrap();
    assert_eq!(handle.len().await, 1);

    let removed = handle
        .remove(ConnectionId::new(1), RemovalReason::Explicit)
        .await
        .unwrap();
    assert_eq!(removed.map(|c| c.id), Some(ConnectionId::new(1)));
    assert!(handle.is_empty().await);
}

#[tokio::test]
async fn test_duplicate_add_fails() {
    let handle = spawn_registry();

    let (first, _far1) = create_test_client(7);
    let (second, _far2) = create_test_client(7);
    handle.add(first).await.unwrap();

    let result = handle.add(second).await;
    assert_eq!(
        result,
        Err(RegistryError::DuplicateConnection(ConnectionId::new(7)))
    );
}

#[tokio::test]
async fn test_remove_twice_is_none() {
    let handle = spawn_registry();
    let (client, _far) = create_test_client(1);
    handle.add(client).await.unwrap();

    let id = ConnectionId::new(1);
    assert!(handle
        .remove(id, RemovalReason::PeerClosed)
        .await
        .unwrap()
        .is_some());
    assert!(handle
        .remove(id, RemovalReason::Evicted)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_is_in_connection_order() {
    let handle = spawn_registry();
    let mut far_ends = Vec::new();
    for id in [3, 1, 2] {
        let (client, far) = create_test_client(id);
        handle.add(client).await.unwrap();
        far_ends.push(far);
    }

    let ids: Vec<u64> = handle.list().await.iter().map(|c| c.id.as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

// ============================================================================
// ForEach Tests
// ============================================================================

#[tokio::test]
async fn test_for_each_evicting_everything() {
    let handle = spawn_registry();
    let mut far_ends = Vec::new();
    for id in 0..10 {
        let (client, far) = create_test_client(id);
        handle.add(client).await.unwrap();
        far_ends.push(far);
    }

    let visits = Arc::new(AtomicUsize::new(0));
    let summary = handle
        .for_each(Box::new(EvictAll(visits.clone())))
        .await
        .unwrap();

    assert_eq!(visits.load(Ordering::SeqCst), 10);
    assert_eq!(summary.visited, 10);
    assert_eq!(summary.evicted.len(), 10);
    assert!(handle.is_empty().await);
}

#[tokio::test]
async fn test_add_during_for_each_does_not_deadlock() {
    let handle = spawn_registry();
    let (client, _far) = create_test_client(1);
    handle.add(client).await.unwrap();

    let walker = handle.clone();
    let walk = tokio::spawn(async move {
        walker
            .for_each(Box::new(SlowKeep(Duration::from_millis(100))))
            .await
    });

    // Give the walk a head start, then add while it is running
    sleep(Duration::from_millis(20)).await;
    let (late, _late_far) = create_test_client(2);
    timeout(Duration::from_secs(2), handle.add(late))
        .await
        .expect("add completes once the walk ends")
        .unwrap();

    let summary = walk.await.unwrap().unwrap();
    assert_eq!(summary.visited, 1);
    assert_eq!(handle.len().await, 2);
}

// ============================================================================
// Shutdown & Scale Tests
// ============================================================================

#[tokio::test]
async fn test_clear_closes_every_client() {
    let handle = spawn_registry();
    let (a, mut far_a) = create_test_client(1);
    let (b, mut far_b) = create_test_client(2);
    handle.add(a).await.unwrap();
    handle.add(b).await.unwrap();

    assert_eq!(handle.clear().await, 2);
    assert!(handle.is_empty().await);

    // Dropped handles close their write side
    let mut buf = [0u8; 1];
    assert_eq!(far_a.read(&mut buf).await.unwrap(), 0);
    assert_eq!(far_b.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_every_connection_is_admitted() {
    let handle = spawn_registry();
    let mut far_ends = Vec::new();

    for id in 0..2000 {
        let (client, far) = create_test_client(id);
        handle.add(client).await.unwrap();
        far_ends.push(far);
    }

    assert_eq!(handle.len().await, 2000);
}

#[tokio::test]
async fn test_concurrent_adds() {
    let handle = spawn_registry();

    let mut tasks = Vec::new();
    for id in 0..50 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (client, far) = create_test_client(id);
            handle.add(client).await.unwrap();
            far
        }));
    }

    let mut far_ends = Vec::new();
    for task in tasks {
        far_ends.push(task.await.unwrap());
    }

    assert_eq!(handle.len().await, 50);
}

#[tokio::test]
async fn test_handle_cloning() {
    let handle = spawn_registry();
    let clone = handle.clone();

    let (client, _far) = create_test_client(1);
    handle.add(client).await.unwrap();

    assert_eq!(clone.len().await, 1);
}
