//! Multi-subscriber event dispatch.
//!
//! An `EventEmitter` decouples event producers from any number of
//! consumers per named event, plus consumers that want every event.
//! Binding and unbinding may happen concurrently with emission: emission
//! iterates over a snapshot taken under the lock, so a listener added
//! during an emit round is not invoked in that round and concurrent
//! removal cannot tear the iteration.
//!
//! Dispatch order is fixed: per-name listeners first, then bind-all
//! listeners, each group in registration order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{guard_handler, ClientError, ErrorReporter};
use ripple_protocol::{Envelope, ProtocolError};

/// A registered event listener.
///
/// The `Arc` identity doubles as the registration identity: registering
/// the same handle twice for the same event is a no-op, and removal is
/// by handle.
pub type Listener = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Default)]
struct Registrations {
    named: HashMap<String, Vec<Listener>>,
    wildcard: Vec<Listener>,
}

/// Thread-safe pub/sub dispatcher keyed by event name.
pub struct EventEmitter {
    registrations: Mutex<Registrations>,
    reporter: ErrorReporter,
}

impl EventEmitter {
    /// Create an emitter that routes listener failures to `reporter`.
    #[must_use]
    pub fn new(reporter: ErrorReporter) -> Self {
        Self {
            registrations: Mutex::new(Registrations::default()),
            reporter,
        }
    }

    /// Bind a listener to a named event.
    ///
    /// Returns the listener handle for later removal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the event name is empty.
    pub fn bind(
        &self,
        event: &str,
        listener: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        let listener: Listener = Arc::new(listener);
        self.bind_listener(event, listener.clone())?;
        Ok(listener)
    }

    /// Bind an existing listener handle to a named event.
    ///
    /// Registering the identical handle for the identical name again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the event name is empty.
    pub fn bind_listener(&self, event: &str, listener: Listener) -> Result<(), ClientError> {
        if event.is_empty() {
            return Err(ClientError::InvalidArgument(
                "event name must not be empty".to_string(),
            ));
        }
        let mut regs = self.lock();
        let slot = regs.named.entry(event.to_string()).or_default();
        if !slot.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            slot.push(listener);
        }
        Ok(())
    }

    /// Bind a listener that receives the payload parsed as JSON.
    ///
    /// Payloads that fail to parse are reported through the shared error
    /// channel; the listener is not invoked for them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the event name is empty.
    pub fn bind_json(
        &self,
        event: &str,
        listener: impl Fn(&Envelope, serde_json::Value) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        let reporter = self.reporter.clone();
        self.bind(event, move |env| {
            let data = env.data.as_deref().unwrap_or("null");
            match serde_json::from_str(data) {
                Ok(value) => listener(env, value),
                Err(e) => reporter.report(ClientError::Protocol(ProtocolError::InvalidPayload {
                    event: env.event.clone(),
                    reason: e.to_string(),
                })),
            }
        })
    }

    /// Bind a listener that receives the payload deserialized into `T`.
    ///
    /// Payloads that fail to deserialize are reported through the shared
    /// error channel; the listener is not invoked for them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the event name is empty.
    pub fn bind_typed<T: DeserializeOwned>(
        &self,
        event: &str,
        listener: impl Fn(T) + Send + Sync + 'static,
    ) -> Result<Listener, ClientError> {
        let reporter = self.reporter.clone();
        self.bind(event, move |env| match env.parse_data::<T>() {
            Ok(value) => listener(value),
            Err(e) => reporter.report(ClientError::Protocol(e)),
        })
    }

    /// Bind a listener invoked for every event.
    pub fn bind_all(&self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> Listener {
        let listener: Listener = Arc::new(listener);
        let mut regs = self.lock();
        if !regs.wildcard.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            regs.wildcard.push(listener.clone());
        }
        listener
    }

    /// Remove every listener bound to a named event. No-op if none exist.
    pub fn unbind(&self, event: &str) {
        self.lock().named.remove(event);
    }

    /// Remove one listener from a named event. No-op if not registered.
    pub fn unbind_listener(&self, event: &str, listener: &Listener) {
        let mut regs = self.lock();
        if let Some(slot) = regs.named.get_mut(event) {
            slot.retain(|l| !Arc::ptr_eq(l, listener));
            if slot.is_empty() {
                regs.named.remove(event);
            }
        }
    }

    /// Remove every binding, named and wildcard.
    pub fn unbind_all(&self) {
        let mut regs = self.lock();
        regs.named.clear();
        regs.wildcard.clear();
    }

    /// Invoke every matching per-name listener, then every wildcard
    /// listener, each in a protected scope.
    ///
    /// A panic raised by one listener is captured, reported through the
    /// shared error channel, and does not prevent the remaining listeners
    /// from running.
    pub fn emit(&self, envelope: &Envelope) {
        let (named, wildcard) = {
            let regs = self.lock();
            (
                regs.named.get(&envelope.event).cloned().unwrap_or_default(),
                regs.wildcard.clone(),
            )
        };

        trace!(
            event = %envelope.event,
            listeners = named.len() + wildcard.len(),
            "Emitting event"
        );

        for listener in named.iter().chain(wildcard.iter()) {
            guard_handler(
                &self.reporter,
                &format!("listener for event '{}'", envelope.event),
                || listener(envelope),
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registrations> {
        self.registrations
            .lock()
            .expect("emitter registrations lock poisoned")
    }
}
