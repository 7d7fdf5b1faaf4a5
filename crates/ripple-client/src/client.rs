//! The client facade and subscription orchestration.
//!
//! `Ripple` ties the connection engine to the subscription table. The
//! table sits behind one mutex that is never held across an await;
//! authorizer calls and socket sends happen outside it, with an attempt
//! counter per channel so results from a superseded attempt are
//! discarded.
//!
//! Concurrent subscribes to the same channel coalesce onto one in-flight
//! attempt and share its outcome. Subscribes taken while disconnected
//! are queued in the backlog and replayed, with fresh authorization, on
//! the next connection.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use ripple_protocol::{
    events, subscribe_frame, unsubscribe_frame, ChannelKind, Envelope, SubscribeRequest,
    SystemError,
};
use ripple_transport::{Backoff, Connector};

use crate::auth::{AuthError, ChannelAuthorizer};
use crate::channel::{Channel, ChannelControl};
use crate::config::{ClientConfig, MasterKey};
use crate::connection::{
    Connection, ConnectionObserver, ConnectionState, StateChange, StateListener,
};
use crate::crypto;
use crate::error::{guard_handler, ClientError, ErrorListener, ErrorReporter};
use crate::registry::{ChannelSlot, SubState, SubscribeFailure, SubscriptionTable};

#[cfg(feature = "websocket")]
use ripple_transport::WebSocketConnector;

type ConnectedListener = Arc<dyn Fn(&str) + Send + Sync>;
type DisconnectedListener = Arc<dyn Fn() + Send + Sync>;
type SubscribedListener = Arc<dyn Fn(&Channel) + Send + Sync>;

/// A realtime client.
///
/// Cheap to clone; clones share the same connection and subscriptions.
#[derive(Clone)]
pub struct Ripple {
    inner: Arc<Inner>,
}

struct Inner {
    self_weak: Weak<Inner>,
    timeout: Duration,
    authorizer: Option<Arc<dyn ChannelAuthorizer>>,
    master_key: Option<MasterKey>,
    connection: Arc<Connection>,
    reporter: ErrorReporter,
    table: Mutex<SubscriptionTable>,
    /// Lock-free read view of live channel handles, kept in step with
    /// the table.
    channels_view: DashMap<String, Arc<Channel>>,
    connected_listeners: Mutex<Vec<ConnectedListener>>,
    disconnected_listeners: Mutex<Vec<DisconnectedListener>>,
    subscribed_listeners: Mutex<Vec<SubscribedListener>>,
}

enum SubscribeAction {
    Done(Arc<Channel>),
    Wait {
        channel: Arc<Channel>,
        waiter_id: u64,
        rx: oneshot::Receiver<Result<(), SubscribeFailure>>,
    },
    Lead {
        channel: Arc<Channel>,
        waiter_id: u64,
        attempt: u64,
        rx: oneshot::Receiver<Result<(), SubscribeFailure>>,
    },
}

impl Ripple {
    /// Create a client for the given configuration, using the WebSocket
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    #[cfg(feature = "websocket")]
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a client with a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        if config.app_key.is_empty() {
            return Err(ClientError::InvalidArgument(
                "app key must not be empty".to_string(),
            ));
        }
        let reporter = ErrorReporter::new();
        let connection = Connection::new(
            connector,
            config.url(),
            config.client_timeout,
            config.auto_reconnect,
            Backoff::new(config.backoff_increment, config.backoff_ceiling),
            reporter.clone(),
        );
        let inner = Arc::new_cyclic(|self_weak| Inner {
            self_weak: self_weak.clone(),
            timeout: config.client_timeout,
            authorizer: config.authorizer,
            master_key: config.master_encryption_key,
            connection,
            reporter,
            table: Mutex::new(SubscriptionTable::default()),
            channels_view: DashMap::new(),
            connected_listeners: Mutex::new(Vec::new()),
            disconnected_listeners: Mutex::new(Vec::new()),
            subscribed_listeners: Mutex::new(Vec::new()),
        });
        let weak = Arc::downgrade(&inner);
        let observer: Weak<dyn ConnectionObserver> = weak;
        inner.connection.set_observer(observer);
        inner.connection.states.transition(ConnectionState::Initialized);
        Ok(Self { inner })
    }

    /// Establish the connection.
    ///
    /// Already connected is a no-op; concurrent calls share one dial.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the connection, the
    /// transport fails, or the attempt times out.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.connection.connect().await
    }

    /// Tear down the connection, keeping channel handles and their
    /// listeners for a later `connect`.
    ///
    /// Idempotent. Pending subscribe calls fail with a disconnection
    /// error; acknowledged subscriptions drop to unsubscribed and are
    /// replayed on the next connection.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    /// Subscribe to a channel, waiting for the service acknowledgment.
    ///
    /// Returns the channel handle. Repeated calls for the same name
    /// return the same handle; calls racing an in-flight subscription
    /// wait for its outcome. While disconnected the request is queued
    /// and replayed on the next connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, required configuration
    /// (authorizer, master key) is missing, authorization is refused or
    /// fails, the service rejects the subscription, or the wait times
    /// out.
    pub async fn subscribe(&self, name: &str) -> Result<Arc<Channel>, ClientError> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument(
                "channel name must not be empty".to_string(),
            ));
        }
        let kind = ChannelKind::from_name(name);
        if kind.requires_authorization() && self.inner.authorizer.is_none() {
            return Err(ClientError::MissingAuthorizer(name.to_string()));
        }
        if kind.is_encrypted() && self.inner.master_key.is_none() {
            return Err(ClientError::InvalidArgument(format!(
                "a master encryption key must be configured to subscribe to '{name}'"
            )));
        }

        let action = self.inner.plan_subscribe(name);
        let (channel, waiter_id, rx) = match action {
            SubscribeAction::Done(channel) => return Ok(channel),
            SubscribeAction::Wait {
                channel,
                waiter_id,
                rx,
            } => (channel, waiter_id, rx),
            SubscribeAction::Lead {
                channel,
                waiter_id,
                attempt,
                rx,
            } => {
                self.inner.run_subscribe(name.to_string(), attempt).await;
                (channel, waiter_id, rx)
            }
        };

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(channel),
            Ok(Ok(Err(failure))) => Err(failure.into_error()),
            Ok(Err(_)) => Err(ClientError::SubscriptionCancelled {
                channel: name.to_string(),
            }),
            Err(_) => {
                self.inner.abandon_waiter(name, waiter_id);
                Err(ClientError::Timeout {
                    operation: "subscribe",
                    timeout: self.inner.timeout,
                })
            }
        }
    }

    /// Unsubscribe from a channel.
    ///
    /// Unknown names are a no-op. Pending subscribe calls for the
    /// channel fail with a cancellation error.
    pub fn unsubscribe(&self, name: &str) {
        self.inner.unsubscribe_inner(name);
    }

    /// Unsubscribe from every channel.
    pub fn unsubscribe_all(&self) {
        let names: Vec<String> = self
            .inner
            .channels_view
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for name in names {
            self.inner.unsubscribe_inner(&name);
        }
    }

    /// Look up a live channel handle by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.inner.channels_view.get(name).map(|e| e.value().clone())
    }

    /// Every live channel handle.
    #[must_use]
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.inner
            .channels_view
            .iter()
            .map(|e| e.value().clone())
            .collect()
    }

    /// The current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// The socket id of the live connection, if any.
    #[must_use]
    pub fn socket_id(&self) -> Option<String> {
        self.inner.connection.socket_id()
    }

    /// Service-advertised inactivity window from the handshake, if any.
    #[must_use]
    pub fn activity_timeout(&self) -> Option<u32> {
        self.inner.connection.activity_timeout()
    }

    /// Listen on the shared error channel.
    ///
    /// Receives asynchronous faults that have no awaiting caller:
    /// transport errors, decrypt failures, rejected replays, panicking
    /// handlers.
    pub fn on_error(&self, listener: impl Fn(&ClientError) + Send + Sync + 'static) -> ErrorListener {
        self.inner.reporter.subscribe(listener)
    }

    /// Stop listening on the shared error channel.
    pub fn off_error(&self, listener: &ErrorListener) {
        self.inner.reporter.unsubscribe(listener);
    }

    /// Listen for connection state transitions.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> StateListener {
        self.inner.connection.states.subscribe(listener)
    }

    /// Stop listening for state transitions.
    pub fn off_state_change(&self, listener: &StateListener) {
        self.inner.connection.states.unsubscribe(listener);
    }

    /// Register a callback fired with the socket id each time the
    /// connection is established, including reconnects.
    pub fn on_connected(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.inner
            .connected_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .push(Arc::new(listener));
    }

    /// Register a callback fired each time the connection drops.
    pub fn on_disconnected(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner
            .disconnected_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .push(Arc::new(listener));
    }

    /// Register a callback fired each time any channel becomes
    /// subscribed, including re-subscriptions after a reconnect.
    pub fn on_subscribed(&self, listener: impl Fn(&Channel) + Send + Sync + 'static) {
        self.inner
            .subscribed_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .push(Arc::new(listener));
    }
}

impl Inner {
    /// Decide, under the table lock, how a subscribe call proceeds.
    fn plan_subscribe(&self, name: &str) -> SubscribeAction {
        let mut table = self.lock_table();
        let waiter_id = table.next_waiter_id();

        if let Some(slot) = table.channels.get_mut(name) {
            if slot.state == SubState::Subscribed {
                return SubscribeAction::Done(slot.channel.clone());
            }
            let (tx, rx) = oneshot::channel();
            slot.waiters.push((waiter_id, tx));
            return SubscribeAction::Wait {
                channel: slot.channel.clone(),
                waiter_id,
                rx,
            };
        }

        let control: Weak<dyn ChannelControl> = self.self_weak.clone();
        let channel = Arc::new(Channel::new(name, control, self.reporter.clone()));
        self.channels_view.insert(name.to_string(), channel.clone());
        let (tx, rx) = oneshot::channel();

        if self.connection.is_connected() {
            let mut slot = ChannelSlot::new(channel.clone(), SubState::Authorizing);
            slot.attempt = 1;
            slot.waiters.push((waiter_id, tx));
            let attempt = slot.attempt;
            table.channels.insert(name.to_string(), slot);
            SubscribeAction::Lead {
                channel,
                waiter_id,
                attempt,
                rx,
            }
        } else {
            debug!(channel = name, "Queueing subscription until connected");
            let mut slot = ChannelSlot::new(channel.clone(), SubState::Queued);
            slot.waiters.push((waiter_id, tx));
            table.channels.insert(name.to_string(), slot);
            table.backlog.push_subscribe(name);
            SubscribeAction::Wait {
                channel,
                waiter_id,
                rx,
            }
        }
    }

    /// Authorize (if required) and send the subscribe frame for one
    /// attempt. Results of a superseded attempt are discarded.
    async fn run_subscribe(&self, name: String, attempt: u64) {
        let kind = ChannelKind::from_name(&name);
        let tokens = if kind.requires_authorization() {
            let Some(socket_id) = self.connection.socket_id() else {
                self.fail_subscribe(
                    &name,
                    attempt,
                    SubscribeFailure::Disconnected {
                        channel: name.clone(),
                    },
                );
                return;
            };
            let Some(authorizer) = self.authorizer.clone() else {
                // Checked at the call site; a replay cannot lose it.
                return;
            };
            debug!(channel = %name, socket_id = %socket_id, "Authorizing");
            let outcome =
                tokio::time::timeout(self.timeout, authorizer.authorize(&name, &socket_id)).await;
            match outcome {
                Ok(Ok(tokens)) => Some(tokens),
                Ok(Err(AuthError::Unauthorized)) => {
                    self.fail_subscribe(
                        &name,
                        attempt,
                        SubscribeFailure::Unauthorized {
                            channel: name.clone(),
                            socket_id: Some(socket_id),
                        },
                    );
                    return;
                }
                Ok(Err(AuthError::Failure(reason))) => {
                    self.fail_subscribe(
                        &name,
                        attempt,
                        SubscribeFailure::AuthFailure {
                            channel: name.clone(),
                            socket_id: Some(socket_id),
                            reason,
                        },
                    );
                    return;
                }
                Err(_) => {
                    self.fail_subscribe(
                        &name,
                        attempt,
                        SubscribeFailure::AuthFailure {
                            channel: name.clone(),
                            socket_id: Some(socket_id),
                            reason: "the authorizer timed out".to_string(),
                        },
                    );
                    return;
                }
            }
        } else {
            None
        };

        let request = SubscribeRequest {
            channel: name.clone(),
            auth: tokens.as_ref().map(|t| t.auth.clone()),
            channel_data: tokens.and_then(|t| t.channel_data),
        };
        let frame = match subscribe_frame(&request) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail_subscribe(
                    &name,
                    attempt,
                    SubscribeFailure::Refused {
                        channel: name.clone(),
                        code: None,
                        message: format!("could not encode subscribe frame: {e}"),
                    },
                );
                return;
            }
        };

        // The attempt may have been cancelled or superseded while the
        // authorizer was running.
        {
            let mut table = self.lock_table();
            let Some(slot) = table.channels.get_mut(&name) else {
                debug!(channel = %name, "Subscription cancelled during authorization");
                return;
            };
            if slot.attempt != attempt || slot.state != SubState::Authorizing {
                debug!(channel = %name, "Discarding result of superseded attempt");
                return;
            }
            slot.state = SubState::SubscribeSent;
        }

        if self.connection.send(&frame).is_err() {
            self.fail_subscribe(
                &name,
                attempt,
                SubscribeFailure::Disconnected {
                    channel: name.clone(),
                },
            );
        }
    }

    /// Resolve one failed attempt: remove the slot and deliver the
    /// failure to its waiters, or to the error channel when no caller is
    /// waiting (a backlog replay).
    fn fail_subscribe(&self, name: &str, attempt: u64, failure: SubscribeFailure) {
        let waiters = {
            let mut table = self.lock_table();
            match table.channels.get(name) {
                Some(slot) if slot.attempt == attempt => {}
                _ => return,
            }
            let Some(mut slot) = table.channels.remove(name) else {
                return;
            };
            table.backlog.remove(name);
            slot.take_waiters()
        };
        self.channels_view.remove(name);
        warn!(channel = name, failure = ?failure, "Subscription failed");
        if waiters.is_empty() {
            self.reporter.report(failure.into_error());
        } else {
            for (_, tx) in waiters {
                let _ = tx.send(Err(failure.clone()));
            }
        }
    }

    /// Remove one timed-out waiter; drop the whole pending slot when it
    /// was the last one.
    fn abandon_waiter(&self, name: &str, waiter_id: u64) {
        let removed = {
            let mut table = self.lock_table();
            let Some(slot) = table.channels.get_mut(name) else {
                return;
            };
            slot.waiters.retain(|(id, _)| *id != waiter_id);
            if slot.waiters.is_empty() && slot.state != SubState::Subscribed {
                table.channels.remove(name);
                table.backlog.remove(name);
                true
            } else {
                false
            }
        };
        if removed {
            self.channels_view.remove(name);
        }
    }

    fn unsubscribe_inner(&self, name: &str) {
        let (slot, send_frame) = {
            let mut table = self.lock_table();
            let slot = table.channels.remove(name);
            let was_active = matches!(
                slot.as_ref().map(|s| s.state),
                Some(SubState::Subscribed | SubState::SubscribeSent)
            );
            if self.connection.is_connected() {
                (slot, was_active)
            } else {
                if slot.is_some() {
                    table.backlog.push_unsubscribe(name);
                }
                (slot, false)
            }
        };
        let Some(mut slot) = slot else { return };
        self.channels_view.remove(name);
        info!(channel = name, "Unsubscribed");
        for (_, tx) in slot.take_waiters() {
            let _ = tx.send(Err(SubscribeFailure::Cancelled {
                channel: name.to_string(),
            }));
        }
        slot.channel.mark_unsubscribed();
        if send_frame {
            match unsubscribe_frame(name) {
                Ok(frame) => {
                    let _ = self.connection.send(&frame);
                }
                Err(e) => self.reporter.report(e.into()),
            }
        }
    }

    fn handle_subscription_succeeded(&self, envelope: &Envelope) {
        let Some(name) = envelope.channel.as_deref() else {
            return;
        };
        let (channel, waiters) = {
            let mut table = self.lock_table();
            let Some(slot) = table.channels.get_mut(name) else {
                debug!(channel = name, "Acknowledgment for unknown channel");
                return;
            };
            if slot.state == SubState::Subscribed {
                return;
            }
            slot.state = SubState::Subscribed;
            (slot.channel.clone(), slot.take_waiters())
        };
        channel.subscription_succeeded(envelope.data.as_deref());
        let listeners = self
            .subscribed_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .clone();
        for listener in &listeners {
            guard_handler(&self.reporter, "subscribed listener", || listener(&channel));
        }
        for (_, tx) in waiters {
            let _ = tx.send(Ok(()));
        }
    }

    fn handle_subscription_error(&self, envelope: &Envelope) {
        let Some(name) = envelope.channel.as_deref() else {
            return;
        };
        let attempt = {
            let table = self.lock_table();
            match table.channels.get(name) {
                Some(slot) => slot.attempt,
                None => return,
            }
        };
        let (code, message) = match envelope.parse_data::<SystemError>() {
            Ok(err) => (err.code, err.message),
            Err(_) => (None, envelope.data.clone().unwrap_or_default()),
        };
        self.fail_subscribe(
            name,
            attempt,
            SubscribeFailure::Refused {
                channel: name.to_string(),
                code,
                message,
            },
        );
    }

    fn deliver_channel_event(&self, envelope: &Envelope) {
        let Some(name) = envelope.channel.as_deref() else {
            debug!(event = %envelope.event, "Dropping channel-less event");
            return;
        };
        let Some(channel) = self.channels_view.get(name).map(|e| e.value().clone()) else {
            debug!(channel = name, event = %envelope.event, "Event for unknown channel");
            return;
        };
        if channel.kind().is_encrypted() {
            let Some(key) = &self.master_key else {
                return;
            };
            match crypto::decrypt_event_data(key.bytes(), envelope.data.as_deref()) {
                Ok(plaintext) => {
                    let mut decrypted = envelope.clone();
                    decrypted.data = Some(plaintext);
                    channel.deliver(&decrypted);
                }
                Err(source) => self.reporter.report(ClientError::Decryption {
                    channel: name.to_string(),
                    source,
                }),
            }
        } else {
            channel.deliver(envelope);
        }
    }

    fn with_channel(&self, envelope: &Envelope, f: impl FnOnce(&Channel)) {
        let Some(name) = envelope.channel.as_deref() else {
            return;
        };
        if let Some(entry) = self.channels_view.get(name) {
            let channel = entry.value().clone();
            drop(entry);
            f(&channel);
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, SubscriptionTable> {
        self.table.lock().expect("subscription table lock poisoned")
    }
}

impl ConnectionObserver for Inner {
    fn on_frame(&self, envelope: Envelope) {
        match envelope.event.as_str() {
            events::SUBSCRIPTION_SUCCEEDED => self.handle_subscription_succeeded(&envelope),
            events::SUBSCRIPTION_ERROR => self.handle_subscription_error(&envelope),
            events::MEMBER_ADDED => self.with_channel(&envelope, |ch| ch.handle_member_added(&envelope)),
            events::MEMBER_REMOVED => {
                self.with_channel(&envelope, |ch| ch.handle_member_removed(&envelope));
            }
            events::SUBSCRIPTION_COUNT => {
                self.with_channel(&envelope, |ch| ch.handle_subscription_count(&envelope));
            }
            events::ERROR => {
                let (code, message) = match envelope.parse_data::<SystemError>() {
                    Ok(err) => (err.code, err.message),
                    Err(_) => (None, envelope.data.clone().unwrap_or_default()),
                };
                self.reporter.report(ClientError::Service { code, message });
            }
            // Already consumed during the handshake.
            events::CONNECTION_ESTABLISHED => {}
            _ => self.deliver_channel_event(&envelope),
        }
    }

    fn on_connected(&self, socket_id: &str, reconnecting: bool) {
        let listeners = self
            .connected_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .clone();
        for listener in &listeners {
            guard_handler(&self.reporter, "connected listener", || listener(socket_id));
        }

        // Replay: backlog operations in request order first, then any
        // remaining registered channels.
        let plan = {
            let mut table = self.lock_table();
            let mut plan: Vec<(String, u64)> = Vec::new();
            let mut planned: HashSet<String> = HashSet::new();
            for op in table.backlog.drain() {
                if let crate::backlog::PendingOp::Subscribe(name) = op {
                    if let Some(slot) = table.channels.get_mut(&name) {
                        slot.state = SubState::Authorizing;
                        slot.attempt += 1;
                        planned.insert(name.clone());
                        plan.push((name, slot.attempt));
                    }
                }
            }
            let names: Vec<String> = table.channels.keys().cloned().collect();
            for name in names {
                if planned.contains(&name) {
                    continue;
                }
                if let Some(slot) = table.channels.get_mut(&name) {
                    if slot.state == SubState::Subscribed {
                        continue;
                    }
                    slot.state = SubState::Authorizing;
                    slot.attempt += 1;
                    plan.push((name.clone(), slot.attempt));
                }
            }
            plan
        };

        if !plan.is_empty() {
            info!(count = plan.len(), reconnecting, "Replaying subscriptions");
        }
        for (name, attempt) in plan {
            if let Some(this) = self.self_weak.upgrade() {
                tokio::spawn(async move {
                    this.run_subscribe(name, attempt).await;
                });
            }
        }
    }

    fn on_dropped(&self, user_initiated: bool) {
        let (channels, waiters) = {
            let mut table = self.lock_table();
            let mut channels = Vec::new();
            let mut waiters = Vec::new();
            for (name, slot) in table.channels.iter_mut() {
                channels.push(slot.channel.clone());
                slot.state = SubState::Queued;
                if user_initiated {
                    for (_, tx) in slot.take_waiters() {
                        waiters.push((
                            tx,
                            SubscribeFailure::Disconnected {
                                channel: name.clone(),
                            },
                        ));
                    }
                }
            }
            (channels, waiters)
        };
        for channel in channels {
            channel.mark_unsubscribed();
        }
        for (tx, failure) in waiters {
            let _ = tx.send(Err(failure));
        }
        let listeners = self
            .disconnected_listeners
            .lock()
            .expect("lifecycle listener lock poisoned")
            .clone();
        for listener in &listeners {
            guard_handler(&self.reporter, "disconnected listener", || listener());
        }
    }
}

impl ChannelControl for Inner {
    fn send_frame(&self, envelope: &Envelope) -> Result<(), ClientError> {
        self.connection.send(envelope)
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn unsubscribe_channel(&self, name: &str) {
        self.unsubscribe_inner(name);
    }
}

impl std::fmt::Debug for Ripple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ripple")
            .field("state", &self.state())
            .field("channels", &self.inner.channels_view.len())
            .finish()
    }
}
