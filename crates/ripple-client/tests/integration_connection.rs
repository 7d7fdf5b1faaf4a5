//! Connection lifecycle tests against the in-memory service fake.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use ripple_client::{ClientConfig, ClientError, ConnectionState, Ripple};
use ripple_transport::{Connector, SocketError, SocketSink, SocketStream};

use common::{wait_for, FakeService};

fn client_for(service: &FakeService) -> Ripple {
    let config = ClientConfig::new("test-key").with_host("service.test");
    Ripple::with_connector(config, service.connector()).unwrap()
}

#[tokio::test]
async fn test_concurrent_connects_share_one_dial() {
    let service = FakeService::new();
    let client = client_for(&service);

    let (a, b, c, d, e) = tokio::join!(
        client.connect(),
        client.connect(),
        client.connect(),
        client.connect(),
        client.connect(),
    );
    for result in [a, b, c, d, e] {
        result.unwrap();
    }

    assert_eq!(service.connection_count(), 1);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.socket_id().as_deref(), Some("s.1"));
    assert_eq!(client.activity_timeout(), Some(120));
}

#[tokio::test]
async fn test_first_connect_walks_connecting_then_connected() {
    let service = FakeService::new();
    let client = client_for(&service);

    let states = Arc::new(Mutex::new(Vec::new()));
    let s = states.clone();
    client.on_state_change(move |change| s.lock().unwrap().push(change.current));

    client.connect().await.unwrap();
    // Already connected is a no-op, no extra transitions.
    client.connect().await.unwrap();

    assert_eq!(
        *states.lock().unwrap(),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let service = FakeService::new();
    let client = client_for(&service);

    let drops = Arc::new(AtomicUsize::new(0));
    let d = drops.clone();
    client.on_disconnected(move || {
        d.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().await.unwrap();
    client.disconnect();
    client.disconnect();

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(client.socket_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_with_backoff_after_unsolicited_drop() {
    let service = FakeService::new();
    let client = client_for(&service);

    let states = Arc::new(Mutex::new(Vec::new()));
    let s = states.clone();
    client.on_state_change(move |change| s.lock().unwrap().push(change.current));

    let connects = Arc::new(Mutex::new(Vec::new()));
    let c = connects.clone();
    client.on_connected(move |socket_id| c.lock().unwrap().push(socket_id.to_string()));

    client.connect().await.unwrap();
    service.kill_connection();

    wait_for(|| service.connection_count() == 2 && client.state() == ConnectionState::Connected)
        .await;

    assert!(states
        .lock()
        .unwrap()
        .contains(&ConnectionState::WaitingToReconnect));
    assert_eq!(client.socket_id().as_deref(), Some("s.2"));
    assert_eq!(*connects.lock().unwrap(), vec!["s.1", "s.2"]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_waiting_stops_the_reconnect() {
    let service = FakeService::new();
    let client = client_for(&service);

    client.connect().await.unwrap();
    service.set_refuse_dial(true);
    service.kill_connection();

    wait_for(|| client.state() == ConnectionState::WaitingToReconnect).await;
    client.disconnect();

    wait_for(|| client.state() == ConnectionState::Disconnected).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.connection_count(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_handshake_rejection_surfaces_code_and_message() {
    let service = FakeService::new();
    service.set_reject_handshake(true);
    let client = client_for(&service);

    let err = client.connect().await.unwrap_err();
    match err {
        ClientError::ConnectionRejected { code, message } => {
            assert_eq!(code, Some(4003));
            assert_eq!(message, "application disabled");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dial_failure_surfaces_as_transport_error() {
    let service = FakeService::new();
    service.set_refuse_dial(true);
    let client = client_for(&service);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_clean_service_close_without_auto_reconnect_stays_down() {
    let service = FakeService::new();
    let config = ClientConfig::new("test-key")
        .with_host("service.test")
        .with_auto_reconnect(false);
    let client = Ripple::with_connector(config, service.connector()).unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = errors.clone();
    client.on_error(move |err| e.lock().unwrap().push(err.to_string()));

    client.connect().await.unwrap();
    service.kill_connection();

    wait_for(|| client.state() == ConnectionState::Disconnected).await;
    // A clean service-side close is not an error; no reconnect either.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.connection_count(), 1);
    assert!(errors.lock().unwrap().is_empty());
}

/// Delegates to the real connector only after the gate is released,
/// holding the dial open so other calls can land mid-connect.
struct GatedDial {
    inner: Arc<dyn Connector>,
    gate: Arc<Notify>,
}

#[async_trait]
impl Connector for GatedDial {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SocketError> {
        self.gate.notified().await;
        self.inner.open(url).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn test_disconnect_during_dial_wins_the_race() {
    let service = FakeService::new();
    let gate = Arc::new(Notify::new());
    let config = ClientConfig::new("test-key").with_host("service.test");
    let connector = Arc::new(GatedDial {
        inner: service.connector(),
        gate: gate.clone(),
    });
    let client = Ripple::with_connector(config, connector).unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let s = states.clone();
    client.on_state_change(move |change| s.lock().unwrap().push(change.current));

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    wait_for(|| client.state() == ConnectionState::Connecting).await;

    client.disconnect();
    gate.notify_one();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ClientError::NotConnected)));

    // The late dial must not resurrect the connection.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.socket_id().is_none());
    assert!(!states.lock().unwrap().contains(&ConnectionState::Connected));
}
