//! Cross-component integration tests
//!
//! Exercises the registry state machine and the relay dispatcher end to end
//! against the in-memory store, with a recording transport standing in for
//! the WebSocket gateway. No server startup or Redis required.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use birdio_relay::error::AppError;
use birdio_relay::registry::RegistryService;
use birdio_relay::relay::RelayDispatcher;
use birdio_relay::store::{ConnectionStore, MemoryConnectionStore};
use birdio_relay::transport::{GatewayTransport, Transport, TransportError};

const DEVICE_ID: &str = "sattelhof-raspberrypi";

/// Transport fake that records every send and can simulate gone handles.
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    gone: bool,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            gone: false,
        }
    }

    fn gone() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            gone: true,
        }
    }

    fn sends(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, connection_handle: &str, payload: &str) -> Result<(), TransportError> {
        if self.gone {
            return Err(TransportError::Gone(connection_handle.to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((connection_handle.to_string(), payload.to_string()));
        Ok(())
    }
}

struct TestEnvironment {
    store: Arc<MemoryConnectionStore>,
    registry: RegistryService,
    transport: Arc<RecordingTransport>,
    dispatcher: RelayDispatcher,
}

fn create_test_environment(transport: RecordingTransport) -> TestEnvironment {
    let store = Arc::new(MemoryConnectionStore::new());
    let registry = RegistryService::new(store.clone());
    let transport = Arc::new(transport);
    let dispatcher = RelayDispatcher::new(
        store.clone(),
        transport.clone() as Arc<dyn Transport>,
        DEVICE_ID,
    );

    TestEnvironment {
        store,
        registry,
        transport,
        dispatcher,
    }
}

// =============================================================================
// Registry state machine
// =============================================================================

#[tokio::test]
async fn connect_registers_current_handle() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();

    let record = env.store.get(DEVICE_ID).await.unwrap().unwrap();
    assert_eq!(record.connection_handle, "conn-1");
}

#[tokio::test]
async fn reconnect_overwrites_instead_of_duplicating() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();
    env.registry.connect(DEVICE_ID, "conn-2").await.unwrap();

    let record = env.store.get(DEVICE_ID).await.unwrap().unwrap();
    assert_eq!(record.connection_handle, "conn-2");
    assert_eq!(env.store.len(), 1);
}

#[tokio::test]
async fn disconnect_clears_registration() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();
    env.registry.disconnect("conn-1").await.unwrap();

    assert!(env.store.get(DEVICE_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn repeated_disconnect_is_a_noop() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();
    env.registry.disconnect("conn-1").await.unwrap();

    // Second call must not error and must leave the same end state
    env.registry.disconnect("conn-1").await.unwrap();
    assert!(env.store.get(DEVICE_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_disconnect_leaves_newer_registration_intact() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "a").await.unwrap();
    env.registry.connect(DEVICE_ID, "b").await.unwrap();
    env.registry.disconnect("a").await.unwrap();

    let record = env.store.get(DEVICE_ID).await.unwrap().unwrap();
    assert_eq!(record.connection_handle, "b");
}

#[tokio::test]
async fn connect_without_device_id_is_rejected() {
    let env = create_test_environment(RecordingTransport::new());

    let err = env.registry.connect("", "conn-1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(env.store.is_empty());
}

#[tokio::test]
async fn devices_register_independently() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect("pi-barn", "a").await.unwrap();
    env.registry.connect("pi-coop", "b").await.unwrap();

    env.registry.disconnect("a").await.unwrap();

    assert!(env.store.get("pi-barn").await.unwrap().is_none());
    let record = env.store.get("pi-coop").await.unwrap().unwrap();
    assert_eq!(record.connection_handle, "b");
}

// =============================================================================
// Relay dispatcher
// =============================================================================

#[tokio::test]
async fn relay_delivers_to_current_handle() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();

    let result = env.dispatcher.dispatch("42.5").await.unwrap();
    assert_eq!(result.device_id, DEVICE_ID);
    assert_eq!(result.connection_handle, "conn-1");

    assert_eq!(
        env.transport.sends(),
        vec![("conn-1".to_string(), "42.5".to_string())]
    );
}

#[tokio::test]
async fn relay_without_registration_makes_no_transport_call() {
    let env = create_test_environment(RecordingTransport::new());

    let err = env.dispatcher.dispatch("x").await.unwrap_err();
    assert!(matches!(err, AppError::NoActiveConnection(_)));
    assert!(env.transport.sends().is_empty());

    let stats = env.dispatcher.stats();
    assert_eq!(stats.no_connection, 1);
    assert_eq!(stats.relayed, 0);
}

#[tokio::test]
async fn relay_to_gone_handle_is_a_distinct_delivery_error() {
    let env = create_test_environment(RecordingTransport::gone());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();

    let err = env.dispatcher.dispatch("x").await.unwrap_err();
    assert!(matches!(err, AppError::Delivery(_)));

    // The ghost record is left in place; cleanup is the registry's job
    let record = env.store.get(DEVICE_ID).await.unwrap().unwrap();
    assert_eq!(record.connection_handle, "conn-1");

    let stats = env.dispatcher.stats();
    assert_eq!(stats.delivery_failed, 1);
    assert_eq!(stats.no_connection, 0);
}

#[tokio::test]
async fn relay_after_clean_disconnect_reports_no_connection() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "conn-1").await.unwrap();
    env.registry.disconnect("conn-1").await.unwrap();

    let err = env.dispatcher.dispatch("x").await.unwrap_err();
    assert!(matches!(err, AppError::NoActiveConnection(_)));
    assert!(env.transport.sends().is_empty());
}

#[tokio::test]
async fn relay_targets_latest_handle_after_reconnect_storm() {
    let env = create_test_environment(RecordingTransport::new());

    env.registry.connect(DEVICE_ID, "a").await.unwrap();
    env.registry.connect(DEVICE_ID, "b").await.unwrap();
    env.registry.disconnect("a").await.unwrap();

    env.dispatcher.dispatch("reading").await.unwrap();

    assert_eq!(
        env.transport.sends(),
        vec![("b".to_string(), "reading".to_string())]
    );
}

// =============================================================================
// Gateway transport end to end
// =============================================================================

#[tokio::test]
async fn gateway_transport_delivers_through_socket_channel() {
    let store = Arc::new(MemoryConnectionStore::new());
    let registry = RegistryService::new(store.clone());
    let gateway = Arc::new(GatewayTransport::new());
    let dispatcher = RelayDispatcher::new(
        store.clone(),
        gateway.clone() as Arc<dyn Transport>,
        DEVICE_ID,
    );

    // Simulate the socket-open path: attach sender, then register
    let (tx, mut rx) = mpsc::channel(8);
    gateway.attach("conn-1".to_string(), tx);
    registry.connect(DEVICE_ID, "conn-1").await.unwrap();

    dispatcher.dispatch("42.5").await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), "42.5");
}

#[tokio::test]
async fn gateway_transport_reports_gone_after_socket_drop() {
    let store = Arc::new(MemoryConnectionStore::new());
    let registry = RegistryService::new(store.clone());
    let gateway = Arc::new(GatewayTransport::new());
    let dispatcher = RelayDispatcher::new(
        store.clone(),
        gateway.clone() as Arc<dyn Transport>,
        DEVICE_ID,
    );

    // Socket dropped abruptly: sender detached, but no disconnect event
    // ever reached the registry, leaving a stale handle behind.
    let (tx, rx) = mpsc::channel(8);
    gateway.attach("conn-1".to_string(), tx);
    registry.connect(DEVICE_ID, "conn-1").await.unwrap();
    drop(rx);
    gateway.detach("conn-1");

    let err = dispatcher.dispatch("x").await.unwrap_err();
    assert!(matches!(err, AppError::Delivery(_)));
}
