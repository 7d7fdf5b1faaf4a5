//! In-memory service fake for integration tests.
//!
//! `FakeService` stands in for the realtime service: it accepts
//! connections through a `Connector` implementation, completes the
//! handshake with a fresh socket id, records every frame the client
//! sends, and (by default) acknowledges subscribe requests the way the
//! service would. Tests drive failures by killing the live connection
//! or injecting frames.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use ripple_client::{AuthTokens, ChannelKind, Envelope};
use ripple_protocol::{events, ConnectionEstablished, PresenceBody, PresenceSnapshot};
use ripple_transport::{Connector, SocketError, SocketSink, SocketStream};

pub struct FakeService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    sent: Mutex<Vec<Envelope>>,
    connections: AtomicUsize,
    auto_ack: AtomicBool,
    refuse_dial: AtomicBool,
    reject_handshake: AtomicBool,
    current: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

/// Route client tracing into the captured test output.
///
/// Filtered by `RUST_LOG`; silent unless set. Safe to call from every
/// test, only the first registration wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl FakeService {
    pub fn new() -> Self {
        init_tracing();
        Self {
            inner: Arc::new(ServiceInner {
                sent: Mutex::new(Vec::new()),
                connections: AtomicUsize::new(0),
                auto_ack: AtomicBool::new(true),
                refuse_dial: AtomicBool::new(false),
                reject_handshake: AtomicBool::new(false),
                current: Mutex::new(None),
            }),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(FakeConnector {
            inner: self.inner.clone(),
        })
    }

    /// Every frame the client has sent, across all connections.
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner.sent.lock().unwrap().clone()
    }

    /// Frames of one event type, by the channel they named.
    pub fn sent_channels(&self, event: &str) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|env| env.event == event)
            .filter_map(|env| {
                env.parse_data::<serde_json::Value>()
                    .ok()
                    .and_then(|v| v["channel"].as_str().map(str::to_string))
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    pub fn set_auto_ack(&self, auto_ack: bool) {
        self.inner.auto_ack.store(auto_ack, Ordering::SeqCst);
    }

    /// Make subsequent dials fail at the socket level.
    pub fn set_refuse_dial(&self, refuse: bool) {
        self.inner.refuse_dial.store(refuse, Ordering::SeqCst);
    }

    /// Answer the next handshake with a `ripple:error` rejection.
    pub fn set_reject_handshake(&self, reject: bool) {
        self.inner.reject_handshake.store(reject, Ordering::SeqCst);
    }

    /// Push a frame to the client on the live connection.
    pub fn inject(&self, envelope: &Envelope) {
        let text = serde_json::to_string(envelope).unwrap();
        self.inject_raw(text);
    }

    pub fn inject_raw(&self, text: String) {
        if let Some(tx) = self.inner.current.lock().unwrap().as_ref() {
            let _ = tx.send(text);
        }
    }

    /// Drop the live connection from the service side.
    pub fn kill_connection(&self) {
        self.inner.current.lock().unwrap().take();
    }

    /// Acknowledge a subscription by hand, for tests with auto-ack off.
    pub fn ack_subscription(&self, channel: &str) {
        self.inject(&ServiceInner::subscription_ack(channel));
    }
}

impl ServiceInner {
    fn subscription_ack(channel: &str) -> Envelope {
        let data = if ChannelKind::from_name(channel).is_presence() {
            let snapshot = PresenceSnapshot {
                presence: PresenceBody {
                    ids: vec!["u.1".to_string()],
                    hash: [(
                        "u.1".to_string(),
                        serde_json::json!({"name": "User One"}),
                    )]
                    .into_iter()
                    .collect(),
                    count: 1,
                },
            };
            serde_json::to_string(&snapshot).unwrap()
        } else {
            "{}".to_string()
        };
        Envelope::channel_event(events::SUBSCRIPTION_SUCCEEDED, channel, data)
    }

    fn handle_client_frame(&self, text: &str) {
        let Ok(envelope) = ripple_protocol::decode(text) else {
            return;
        };
        self.sent.lock().unwrap().push(envelope.clone());
        if envelope.event == events::SUBSCRIBE && self.auto_ack.load(Ordering::SeqCst) {
            if let Ok(request) = envelope.parse_data::<serde_json::Value>() {
                if let Some(channel) = request["channel"].as_str() {
                    let ack = serde_json::to_string(&Self::subscription_ack(channel)).unwrap();
                    if let Some(tx) = self.current.lock().unwrap().as_ref() {
                        let _ = tx.send(ack);
                    }
                }
            }
        }
    }
}

struct FakeConnector {
    inner: Arc<ServiceInner>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SocketError> {
        if self.inner.refuse_dial.load(Ordering::SeqCst) {
            return Err(SocketError::Handshake("connection refused".to_string()));
        }
        let n = self.inner.connections.fetch_add(1, Ordering::SeqCst) + 1;

        let (to_client, from_service) = mpsc::unbounded_channel::<String>();
        let (to_service, mut from_client) = mpsc::unbounded_channel::<String>();
        *self.inner.current.lock().unwrap() = Some(to_client.clone());

        let envelope = if self.inner.reject_handshake.load(Ordering::SeqCst) {
            Envelope::system_event(
                events::ERROR,
                Some(r#"{"message":"application disabled","code":4003}"#.to_string()),
            )
        } else {
            let established = ConnectionEstablished {
                socket_id: format!("s.{n}"),
                activity_timeout: Some(120),
            };
            Envelope::system_event(
                events::CONNECTION_ESTABLISHED,
                Some(serde_json::to_string(&established).unwrap()),
            )
        };
        let _ = to_client.send(serde_json::to_string(&envelope).unwrap());
        drop(to_client);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(text) = from_client.recv().await {
                inner.handle_client_frame(&text);
            }
            // Client hung up; end its inbound stream too.
            inner.current.lock().unwrap().take();
        });

        Ok((
            Box::new(FakeSink {
                tx: Some(to_service),
            }),
            Box::new(FakeStream { rx: from_service }),
        ))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl SocketSink for FakeSink {
    async fn send(&mut self, text: String) -> Result<(), SocketError> {
        match self.tx.as_ref() {
            Some(tx) if tx.send(text).is_ok() => Ok(()),
            _ => Err(SocketError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.tx.take();
        Ok(())
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl SocketStream for FakeStream {
    async fn recv(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.rx.recv().await)
    }
}

/// Poll until the condition holds, yielding to the runtime in between.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition was not reached in time");
}

/// An authorizer that approves everything and counts its calls.
pub fn counting_authorizer(
    calls: Arc<AtomicUsize>,
) -> impl Fn(&str, &str) -> Result<AuthTokens, ripple_client::AuthError> + Send + Sync {
    move |channel: &str, socket_id: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthTokens {
            auth: format!("token:{channel}:{socket_id}"),
            channel_data: ChannelKind::from_name(channel)
                .is_presence()
                .then(|| r#"{"user_id":"u.1","user_info":{"name":"User One"}}"#.to_string()),
        })
    }
}
