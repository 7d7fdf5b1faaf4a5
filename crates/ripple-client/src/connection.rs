//! Connection lifecycle.
//!
//! One `Connection` owns the socket, the handshake, and the reconnect
//! policy. Callers drive it with `connect`/`disconnect`; concurrent
//! `connect` calls coalesce onto a single dial, with followers waiting on
//! the leader's outcome. Inbound frames and lifecycle transitions are
//! pushed to a `ConnectionObserver` (the client core).
//!
//! An unsolicited closure is retried with exponential backoff while the
//! connection waits in the `WaitingToReconnect` state. Each established
//! socket gets a generation number; tasks belonging to a superseded
//! socket observe the bump and exit without touching shared state.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use ripple_protocol::{events, ConnectionEstablished, Envelope, SystemError};
use ripple_transport::{Backoff, Connector, SocketSink, SocketStream};

use crate::error::{guard_handler, ClientError, ErrorReporter};

/// The lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Before the client is constructed.
    Uninitialized,
    /// Constructed, never connected.
    Initialized,
    /// A dial or handshake is in progress.
    Connecting,
    /// The handshake completed and the socket is live.
    Connected,
    /// A caller-requested disconnect is in progress.
    Disconnecting,
    /// No socket, no dial in progress.
    Disconnected,
    /// Waiting out the backoff delay before redialing.
    WaitingToReconnect,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Initialized => "initialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::WaitingToReconnect => "waiting_to_reconnect",
        };
        f.write_str(name)
    }
}

/// A single observed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State before the transition.
    pub previous: ConnectionState,
    /// State after the transition.
    pub current: ConnectionState,
}

/// A listener on connection state transitions.
pub type StateListener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Holds the current state and notifies listeners on transitions.
///
/// Notification happens under a dedicated mutex so listeners observe
/// transitions in order and never see them interleaved.
pub(crate) struct StateCell {
    current: Mutex<ConnectionState>,
    notify: Mutex<()>,
    listeners: Mutex<Vec<StateListener>>,
    reporter: ErrorReporter,
}

impl StateCell {
    pub(crate) fn new(reporter: ErrorReporter) -> Self {
        Self {
            current: Mutex::new(ConnectionState::Uninitialized),
            notify: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            reporter,
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.current.lock().expect("connection state lock poisoned")
    }

    pub(crate) fn subscribe(
        &self,
        listener: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> StateListener {
        let listener: StateListener = Arc::new(listener);
        self.listeners
            .lock()
            .expect("state listener lock poisoned")
            .push(listener.clone());
        listener
    }

    pub(crate) fn unsubscribe(&self, listener: &StateListener) {
        self.listeners
            .lock()
            .expect("state listener lock poisoned")
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Move to `next`, notifying listeners. Same-state transitions are
    /// silently dropped.
    pub(crate) fn transition(&self, next: ConnectionState) {
        let _ordered = self.notify.lock().expect("state notify lock poisoned");
        let previous = {
            let mut current = self.current.lock().expect("connection state lock poisoned");
            if *current == next {
                return;
            }
            std::mem::replace(&mut *current, next)
        };
        debug!(from = %previous, to = %next, "Connection state changed");
        let change = StateChange {
            previous,
            current: next,
        };
        let listeners = self
            .listeners
            .lock()
            .expect("state listener lock poisoned")
            .clone();
        for listener in &listeners {
            guard_handler(&self.reporter, "state change listener", || listener(&change));
        }
    }
}

/// Why a dial did not produce a live connection.
#[derive(Debug, Clone)]
pub(crate) enum ConnectFailure {
    /// The service refused the connection during the handshake.
    Rejected {
        code: Option<u16>,
        message: String,
    },
    /// A socket-level fault.
    Transport(String),
    /// The dial or handshake exceeded the client timeout.
    Timeout,
    /// The socket closed cleanly before the handshake completed.
    Closed,
    /// A caller-initiated disconnect superseded the dial.
    Cancelled,
}

/// Receives inbound frames and lifecycle events from the connection.
pub(crate) trait ConnectionObserver: Send + Sync {
    /// A decoded frame arrived on the live socket.
    fn on_frame(&self, envelope: Envelope);

    /// The handshake completed and the socket is live.
    fn on_connected(&self, socket_id: &str, reconnecting: bool);

    /// The socket is gone, either by request or unsolicited.
    fn on_dropped(&self, user_initiated: bool);
}

enum Outbound {
    Frame(String),
    Close,
}

#[derive(Default)]
struct ConnectSync {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Result<(), ConnectFailure>>>,
}

/// The connection engine.
pub(crate) struct Connection {
    self_weak: Weak<Connection>,
    connector: Arc<dyn Connector>,
    url: String,
    timeout: Duration,
    reconnect_enabled: bool,
    pub(crate) states: StateCell,
    observer: Mutex<Option<Weak<dyn ConnectionObserver>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    socket_id: Mutex<Option<String>>,
    activity_timeout: Mutex<Option<u32>>,
    generation: AtomicU64,
    auto_reconnect: AtomicBool,
    backoff: Mutex<Backoff>,
    connect_sync: Mutex<ConnectSync>,
    disconnect_sync: Mutex<()>,
    reporter: ErrorReporter,
}

impl Connection {
    pub(crate) fn new(
        connector: Arc<dyn Connector>,
        url: String,
        timeout: Duration,
        reconnect_enabled: bool,
        backoff: Backoff,
        reporter: ErrorReporter,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            connector,
            url,
            timeout,
            reconnect_enabled,
            states: StateCell::new(reporter.clone()),
            observer: Mutex::new(None),
            outbound: Mutex::new(None),
            socket_id: Mutex::new(None),
            activity_timeout: Mutex::new(None),
            generation: AtomicU64::new(0),
            auto_reconnect: AtomicBool::new(reconnect_enabled),
            backoff: Mutex::new(backoff),
            connect_sync: Mutex::new(ConnectSync::default()),
            disconnect_sync: Mutex::new(()),
            reporter,
        })
    }

    pub(crate) fn set_observer(&self, observer: Weak<dyn ConnectionObserver>) {
        *self.observer.lock().expect("observer lock poisoned") = Some(observer);
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.states.current()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.states.current() == ConnectionState::Connected
    }

    pub(crate) fn socket_id(&self) -> Option<String> {
        self.lock_socket_id().clone()
    }

    /// Service-advertised inactivity window, from the handshake payload.
    pub(crate) fn activity_timeout(&self) -> Option<u32> {
        *self
            .activity_timeout
            .lock()
            .expect("activity timeout lock poisoned")
    }

    /// Establish the connection.
    ///
    /// Already connected is a no-op. Concurrent calls coalesce: one caller
    /// dials, the rest await the same outcome.
    pub(crate) async fn connect(&self) -> Result<(), ClientError> {
        self.auto_reconnect
            .store(self.reconnect_enabled, Ordering::SeqCst);

        let follower_rx = {
            let mut sync = self.lock_connect();
            if self.is_connected() {
                return Ok(());
            }
            if sync.in_flight {
                let (tx, rx) = oneshot::channel();
                sync.waiters.push(tx);
                Some(rx)
            } else {
                sync.in_flight = true;
                None
            }
        };

        if let Some(rx) = follower_rx {
            return match tokio::time::timeout(self.timeout, rx).await {
                Ok(Ok(result)) => result.map_err(|f| self.failure_to_error(f)),
                Ok(Err(_)) => Err(ClientError::NotConnected),
                Err(_) => Err(ClientError::Timeout {
                    operation: "connect",
                    timeout: self.timeout,
                }),
            };
        }

        let result = self.attempt(false).await;
        self.finish_connect(&result);
        result.map_err(|f| self.failure_to_error(f))
    }

    /// Tear down the connection.
    ///
    /// Idempotent. Disables automatic reconnection and notifies the
    /// observer of a user-initiated drop.
    pub(crate) fn disconnect(&self) {
        let _ordered = self.lock_disconnect();
        self.auto_reconnect.store(false, Ordering::SeqCst);
        if matches!(
            self.states.current(),
            ConnectionState::Uninitialized
                | ConnectionState::Initialized
                | ConnectionState::Disconnected
        ) {
            return;
        }

        info!("Disconnecting");
        // Orphan the reader belonging to the current socket.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.states.transition(ConnectionState::Disconnecting);
        if let Some(tx) = self.lock_outbound().take() {
            let _ = tx.send(Outbound::Close);
        }
        self.lock_socket_id().take();
        self.states.transition(ConnectionState::Disconnected);
        if let Some(observer) = self.observer() {
            observer.on_dropped(true);
        }
    }

    /// Send a frame on the live socket.
    ///
    /// The frame is handed to the writer task; delivery is not awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no live socket or encoding fails.
    pub(crate) fn send(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let text = ripple_protocol::encode(envelope)?;
        let outbound = self.lock_outbound();
        match outbound.as_ref() {
            Some(tx) if tx.send(Outbound::Frame(text)).is_ok() => Ok(()),
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Dial, complete the handshake, and start the socket tasks.
    ///
    /// A caller-initiated `disconnect` racing the dial bumps the
    /// generation; the attempt notices, discards the fresh socket, and
    /// reports itself cancelled instead of resurrecting the connection.
    async fn attempt(&self, reconnecting: bool) -> Result<(), ConnectFailure> {
        let snapshot = self.generation.load(Ordering::SeqCst);
        self.states.transition(ConnectionState::Connecting);
        debug!(url = %self.url, transport = self.connector.name(), "Dialing");

        let opened = tokio::time::timeout(self.timeout, self.connector.open(&self.url)).await;
        let (mut sink, mut stream) = match opened {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return self.fail_attempt(ConnectFailure::Transport(e.to_string())),
            Err(_) => return self.fail_attempt(ConnectFailure::Timeout),
        };

        let established = match self.await_handshake(&mut stream).await {
            Ok(established) => established,
            Err(failure) => return self.fail_attempt(failure),
        };

        // Install the socket under the disconnect lock so a racing
        // disconnect either cancels this attempt or tears down the
        // fully installed socket, never half of each.
        let installed = {
            let _ordered = self.lock_disconnect();
            let claimed = self
                .generation
                .compare_exchange(snapshot, snapshot + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if claimed {
                let (tx, rx) = mpsc::unbounded_channel();
                *self.lock_outbound() = Some(tx);
                *self.lock_socket_id() = Some(established.socket_id.clone());
                *self
                    .activity_timeout
                    .lock()
                    .expect("activity timeout lock poisoned") = established.activity_timeout;
                self.lock_backoff().reset();
                self.states.transition(ConnectionState::Connected);
                Some((snapshot + 1, rx))
            } else {
                None
            }
        };
        let Some((generation, rx)) = installed else {
            debug!("Dial superseded by a disconnect; discarding the socket");
            let _ = sink.close().await;
            return Err(ConnectFailure::Cancelled);
        };

        tokio::spawn(run_writer(sink, rx));
        if let Some(this) = self.self_weak.upgrade() {
            tokio::spawn(this.run_reader(stream, generation));
        }

        info!(socket_id = %established.socket_id, reconnecting, "Connected");
        if let Some(observer) = self.observer() {
            observer.on_connected(&established.socket_id, reconnecting);
        }
        Ok(())
    }

    fn fail_attempt(&self, failure: ConnectFailure) -> Result<(), ConnectFailure> {
        warn!(failure = ?failure, "Connection attempt failed");
        self.states.transition(ConnectionState::Disconnected);
        Err(failure)
    }

    /// Read frames until the service accepts or rejects the connection.
    async fn await_handshake(
        &self,
        stream: &mut Box<dyn SocketStream>,
    ) -> Result<ConnectionEstablished, ConnectFailure> {
        loop {
            let frame = match tokio::time::timeout(self.timeout, stream.recv()).await {
                Ok(Ok(Some(text))) => text,
                Ok(Ok(None)) => return Err(ConnectFailure::Closed),
                Ok(Err(e)) => return Err(ConnectFailure::Transport(e.to_string())),
                Err(_) => return Err(ConnectFailure::Timeout),
            };
            let envelope = match ripple_protocol::decode(&frame) {
                Ok(envelope) => envelope,
                Err(e) => return Err(ConnectFailure::Transport(e.to_string())),
            };
            match envelope.event.as_str() {
                events::CONNECTION_ESTABLISHED => {
                    return envelope
                        .parse_data::<ConnectionEstablished>()
                        .map_err(|e| ConnectFailure::Transport(e.to_string()));
                }
                events::ERROR => {
                    let (code, message) = match envelope.parse_data::<SystemError>() {
                        Ok(err) => (err.code, err.message),
                        Err(_) => (None, envelope.data.unwrap_or_default()),
                    };
                    return Err(ConnectFailure::Rejected { code, message });
                }
                other => {
                    debug!(event = other, "Ignoring pre-handshake frame");
                }
            }
        }
    }

    /// Read the live socket until it ends, then run the closure path.
    async fn run_reader(self: Arc<Self>, mut stream: Box<dyn SocketStream>, generation: u64) {
        let error = loop {
            match stream.recv().await {
                Ok(Some(text)) => match ripple_protocol::decode(&text) {
                    Ok(envelope) => {
                        if let Some(observer) = self.observer() {
                            observer.on_frame(envelope);
                        }
                    }
                    Err(e) => self.reporter.report(ClientError::Protocol(e)),
                },
                Ok(None) => break None,
                Err(e) => break Some(e.to_string()),
            }
        };
        self.handle_closure(generation, error).await;
    }

    /// React to the socket ending, unless a newer socket has replaced it.
    async fn handle_closure(&self, generation: u64, error: Option<String>) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(message) = error {
            self.reporter.report(ClientError::Transport {
                state: self.states.current(),
                message,
            });
        }
        warn!("Connection dropped");
        self.lock_outbound().take();
        self.lock_socket_id().take();
        self.states.transition(ConnectionState::Disconnected);
        if let Some(observer) = self.observer() {
            observer.on_dropped(false);
        }
        if self.auto_reconnect.load(Ordering::SeqCst) {
            self.run_reconnect().await;
        }
    }

    /// Redial with backoff until connected, told to stop, or refused.
    ///
    /// Boxed because the reader, closure, and dial paths form a cycle
    /// (`run_reader` -> `handle_closure` -> `run_reconnect` -> `attempt`
    /// spawns `run_reader`); without type erasure the spawned future's
    /// type would be infinitely recursive.
    fn run_reconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.reconnect_loop())
    }

    async fn reconnect_loop(&self) {
        loop {
            self.states.transition(ConnectionState::WaitingToReconnect);
            let delay = self.lock_backoff().next_delay();
            debug!(?delay, "Waiting to reconnect");
            tokio::time::sleep(delay).await;

            if !self.auto_reconnect.load(Ordering::SeqCst) {
                self.states.transition(ConnectionState::Disconnected);
                return;
            }
            {
                let mut sync = self.lock_connect();
                if sync.in_flight {
                    // A manual connect owns the dial.
                    return;
                }
                sync.in_flight = true;
            }

            let result = self.attempt(true).await;
            self.finish_connect(&result);
            match result {
                Ok(()) => return,
                Err(ConnectFailure::Rejected { code, message }) => {
                    // The service refused us outright; retrying cannot help.
                    self.reporter
                        .report(ClientError::ConnectionRejected { code, message });
                    self.states.transition(ConnectionState::Disconnected);
                    return;
                }
                // A disconnect won the race; it already settled the state.
                Err(ConnectFailure::Cancelled) => return,
                Err(failure) => {
                    warn!(failure = ?failure, "Reconnect attempt failed");
                }
            }
        }
    }

    fn finish_connect(&self, result: &Result<(), ConnectFailure>) {
        let waiters = {
            let mut sync = self.lock_connect();
            sync.in_flight = false;
            std::mem::take(&mut sync.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    fn failure_to_error(&self, failure: ConnectFailure) -> ClientError {
        match failure {
            ConnectFailure::Rejected { code, message } => {
                ClientError::ConnectionRejected { code, message }
            }
            ConnectFailure::Transport(message) => ClientError::Transport {
                state: ConnectionState::Connecting,
                message,
            },
            ConnectFailure::Timeout => ClientError::Timeout {
                operation: "connect",
                timeout: self.timeout,
            },
            ConnectFailure::Closed => ClientError::Transport {
                state: ConnectionState::Connecting,
                message: "socket closed during handshake".to_string(),
            },
            ConnectFailure::Cancelled => ClientError::NotConnected,
        }
    }

    fn observer(&self) -> Option<Arc<dyn ConnectionObserver>> {
        self.observer
            .lock()
            .expect("observer lock poisoned")
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Outbound>>> {
        self.outbound.lock().expect("outbound lock poisoned")
    }

    fn lock_socket_id(&self) -> MutexGuard<'_, Option<String>> {
        self.socket_id.lock().expect("socket id lock poisoned")
    }

    fn lock_backoff(&self) -> MutexGuard<'_, Backoff> {
        self.backoff.lock().expect("backoff lock poisoned")
    }

    fn lock_connect(&self) -> MutexGuard<'_, ConnectSync> {
        self.connect_sync.lock().expect("connect sync lock poisoned")
    }

    fn lock_disconnect(&self) -> MutexGuard<'_, ()> {
        self.disconnect_sync.lock().expect("disconnect lock poisoned")
    }
}

/// Drain the outbound queue into the sink, closing on request or when
/// every sender is gone.
async fn run_writer(mut sink: Box<dyn SocketSink>, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(text) => {
                if let Err(e) = sink.send(text).await {
                    warn!(error = %e, "Failed to send frame");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = sink.close().await;
}
