//! A single channel and its event surface.
//!
//! A `Channel` handle is created when a subscription is first requested
//! and lives until it is unsubscribed. The same handle is returned to
//! every caller that subscribes to the same name, so listeners bound on
//! it survive reconnects and re-subscriptions. Channels never talk to
//! the socket directly; outbound traffic goes through the client, which
//! the channel reaches over a weak control handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Weak};

use serde::Serialize;
use tracing::{debug, warn};

use ripple_protocol::{
    events, ChannelKind, Envelope, MemberAdded, MemberRemoved, PresenceSnapshot, SubscriptionCount,
};

use crate::emitter::{EventEmitter, Listener};
use crate::error::{guard_handler, ClientError, ErrorReporter};
use crate::presence::{Member, MemberRoster};

/// Outbound access from a channel back to its owning client.
pub(crate) trait ChannelControl: Send + Sync {
    /// Send a frame over the live connection.
    fn send_frame(&self, envelope: &Envelope) -> Result<(), ClientError>;

    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Unsubscribe the named channel.
    fn unsubscribe_channel(&self, name: &str);
}

type SubscribedCallback = Box<dyn Fn(&Channel) + Send + Sync>;
type MemberCallback = Box<dyn Fn(&Member) + Send + Sync>;

/// A subscription handle to one channel.
pub struct Channel {
    name: String,
    kind: ChannelKind,
    subscribed: AtomicBool,
    emitter: EventEmitter,
    roster: Option<MemberRoster>,
    control: Weak<dyn ChannelControl>,
    reporter: ErrorReporter,
    subscriber_count: Mutex<Option<u64>>,
    on_subscribed: Mutex<Vec<SubscribedCallback>>,
    on_member_added: Mutex<Vec<MemberCallback>>,
    on_member_removed: Mutex<Vec<MemberCallback>>,
}

impl Channel {
    pub(crate) fn new(
        name: impl Into<String>,
        control: Weak<dyn ChannelControl>,
        reporter: ErrorReporter,
    ) -> Self {
        let name = name.into();
        let kind = ChannelKind::from_name(&name);
        Self {
            name,
            kind,
            subscribed: AtomicBool::new(false),
            emitter: EventEmitter::new(reporter.clone()),
            roster: kind.is_presence().then(MemberRoster::new),
            control,
            reporter,
            subscriber_count: Mutex::new(None),
            on_subscribed: Mutex::new(Vec::new()),
            on_member_added: Mutex::new(Vec::new()),
            on_member_removed: Mutex::new(Vec::new()),
        }
    }

    /// The channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel kind, derived from the name prefix.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Whether the subscription is currently acknowledged by the service.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Latest service-reported subscriber count, if one was delivered.
    #[must_use]
    pub fn subscriber_count(&self) -> Option<u64> {
        *self.lock_count()
    }

    /// Current presence members. Empty for non-presence channels.
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        self.roster.as_ref().map(MemberRoster::members).unwrap_or_default()
    }

    /// Current presence member count. Zero for non-presence channels.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.roster.as_ref().map_or(0, MemberRoster::count)
    }

    /// Look up a presence member by user id.
    #[must_use]
    pub fn member(&self, user_id: &str) -> Option<Member> {
        self.roster.as_ref().and_then(|r| r.member(user_id))
    }

    /// Bind a listener to a named event on this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the event name is empty.
    pub fn bind(
        &self,
        event: &str,
        listener: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        self.emitter.bind(event, listener)
    }

    /// Bind a listener that receives the payload as parsed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the event name is empty.
    pub fn bind_json(
        &self,
        event: &str,
        listener: impl Fn(&Envelope, serde_json::Value) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        self.emitter.bind_json(event, listener)
    }

    /// Bind a listener that receives the payload deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event name is empty.
    pub fn bind_typed<T: serde::de::DeserializeOwned>(
        &self,
        event: &str,
        listener: impl Fn(T) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        self.emitter.bind_typed(event, listener)
    }

    /// Bind a listener to every event delivered on this channel.
    pub fn bind_all(&self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> Listener {
        self.emitter.bind_all(listener)
    }

    /// Remove all listeners bound to the named event.
    pub fn unbind(&self, event: &str) {
        self.emitter.unbind(event);
    }

    /// Remove one previously bound listener.
    pub fn unbind_listener(&self, event: &str, listener: &Listener) {
        self.emitter.unbind_listener(event, listener);
    }

    /// Register a callback fired whenever this channel becomes subscribed,
    /// including after a reconnect.
    pub fn on_subscribed(&self, callback: impl Fn(&Channel) + Send + Sync + 'static) {
        self.lock_callbacks(&self.on_subscribed).push(Box::new(callback));
    }

    /// Register a callback fired when a presence member joins.
    pub fn on_member_added(&self, callback: impl Fn(&Member) + Send + Sync + 'static) {
        self.lock_callbacks(&self.on_member_added).push(Box::new(callback));
    }

    /// Register a callback fired when a presence member leaves.
    pub fn on_member_removed(&self, callback: impl Fn(&Member) + Send + Sync + 'static) {
        self.lock_callbacks(&self.on_member_removed).push(Box::new(callback));
    }

    /// Send a client event on this channel.
    ///
    /// The event name must carry the `client-` prefix, the channel must be
    /// a private or presence channel, and the subscription must be live.
    ///
    /// # Errors
    ///
    /// Returns an error if the event name or channel kind disallows client
    /// events, if the channel is not subscribed, or if the connection is
    /// down.
    pub fn trigger<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), ClientError> {
        if !events::is_client_event(event) {
            return Err(ClientError::InvalidArgument(format!(
                "client events must be prefixed with '{}', got '{event}'",
                events::CLIENT_PREFIX
            )));
        }
        if !self.kind.allows_client_events() {
            return Err(ClientError::InvalidArgument(format!(
                "client events are not allowed on {} channel '{}'",
                self.kind, self.name
            )));
        }
        if !self.is_subscribed() {
            return Err(ClientError::NotSubscribed {
                channel: self.name.clone(),
            });
        }
        let control = self.control.upgrade().ok_or(ClientError::NotConnected)?;
        if !control.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let data = serde_json::to_string(payload)
            .map_err(|e| ClientError::InvalidArgument(format!("unserializable payload: {e}")))?;
        let frame = Envelope::channel_event(event, self.name.clone(), data);
        debug!(channel = %self.name, event, "Triggering client event");
        control.send_frame(&frame)
    }

    /// Unsubscribe this channel.
    pub fn unsubscribe(&self) {
        if let Some(control) = self.control.upgrade() {
            control.unsubscribe_channel(&self.name);
        }
    }

    /// Mark the subscription acknowledged, seeding the presence roster
    /// from the ack payload when this is a presence channel.
    ///
    /// Idempotent: a second acknowledgment for an already-live
    /// subscription fires no callbacks.
    pub(crate) fn subscription_succeeded(&self, data: Option<&str>) {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let (Some(roster), Some(data)) = (self.roster.as_ref(), data) {
            match serde_json::from_str::<PresenceSnapshot>(data) {
                Ok(snapshot) => roster.apply_snapshot(&snapshot),
                Err(e) => {
                    warn!(channel = %self.name, error = %e, "Malformed presence snapshot");
                    self.reporter.report(ClientError::Protocol(
                        ripple_protocol::ProtocolError::InvalidPayload {
                            event: events::SUBSCRIPTION_SUCCEEDED.to_string(),
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }
        debug!(channel = %self.name, "Subscribed");
        let callbacks = self.lock_callbacks(&self.on_subscribed);
        for callback in callbacks.iter() {
            guard_handler(&self.reporter, "subscribed callback", || callback(self));
        }
    }

    /// Clear the live flag and presence roster after an unsubscribe or a
    /// dropped connection.
    pub(crate) fn mark_unsubscribed(&self) {
        self.subscribed.store(false, Ordering::SeqCst);
        if let Some(roster) = &self.roster {
            roster.clear();
        }
    }

    pub(crate) fn handle_member_added(&self, envelope: &Envelope) {
        let Some(roster) = &self.roster else { return };
        match envelope.parse_data::<MemberAdded>() {
            Ok(added) => {
                let (member, was_new) = roster.add(&added);
                if was_new {
                    let callbacks = self.lock_callbacks(&self.on_member_added);
                    for callback in callbacks.iter() {
                        guard_handler(&self.reporter, "member_added callback", || {
                            callback(&member);
                        });
                    }
                }
                self.emitter.emit(envelope);
            }
            Err(e) => self.reporter.report(ClientError::Protocol(e)),
        }
    }

    pub(crate) fn handle_member_removed(&self, envelope: &Envelope) {
        let Some(roster) = &self.roster else { return };
        match envelope.parse_data::<MemberRemoved>() {
            Ok(removed) => {
                if let Some(member) = roster.remove(&removed.user_id) {
                    let callbacks = self.lock_callbacks(&self.on_member_removed);
                    for callback in callbacks.iter() {
                        guard_handler(&self.reporter, "member_removed callback", || {
                            callback(&member);
                        });
                    }
                }
                self.emitter.emit(envelope);
            }
            Err(e) => self.reporter.report(ClientError::Protocol(e)),
        }
    }

    pub(crate) fn handle_subscription_count(&self, envelope: &Envelope) {
        match envelope.parse_data::<SubscriptionCount>() {
            Ok(count) => {
                *self.lock_count() = Some(count.subscription_count);
                self.emitter.emit(envelope);
            }
            Err(e) => self.reporter.report(ClientError::Protocol(e)),
        }
    }

    /// Deliver a channel event to bound listeners.
    pub(crate) fn deliver(&self, envelope: &Envelope) {
        self.emitter.emit(envelope);
    }

    fn lock_count(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        self.subscriber_count
            .lock()
            .expect("subscriber count lock poisoned")
    }

    fn lock_callbacks<'a, T>(&self, callbacks: &'a Mutex<Vec<T>>) -> std::sync::MutexGuard<'a, Vec<T>> {
        callbacks.lock().expect("channel callback lock poisoned")
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}
