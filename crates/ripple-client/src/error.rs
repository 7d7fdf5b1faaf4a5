//! Client error taxonomy and the shared error channel.
//!
//! Expected failure paths (authorization rejected, timeouts, usage errors)
//! are returned as `Result`s to the awaiting caller. Asynchronous faults
//! with no awaiting caller (transport errors, decrypt failures on inbound
//! frames, panicking handlers, backlog replay failures) are delivered
//! through the `ErrorReporter` instead, exactly once per fault.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

use crate::connection::ConnectionState;
use crate::crypto::DecryptionError;
use ripple_protocol::ProtocolError;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service refused the connection during the handshake
    /// (bad app key, over quota, must use TLS, application disabled).
    #[error("connection rejected by the service: {message} (code {code:?})")]
    ConnectionRejected {
        /// Service error code, when provided.
        code: Option<u16>,
        /// Service error message.
        message: String,
    },

    /// A socket-level fault, tagged with the connection state at the time.
    #[error("transport error while {state}: {message}")]
    Transport {
        /// Connection state when the error occurred.
        state: ConnectionState,
        /// Underlying transport error.
        message: String,
    },

    /// An operation that requires a live connection was attempted without one.
    #[error("not connected")]
    NotConnected,

    /// The authorizer refused access to a channel (HTTP 403).
    #[error("authorization refused for channel '{channel}' (socket {socket_id:?})")]
    Unauthorized {
        /// The channel that was refused.
        channel: String,
        /// Socket id quoted to the authorizer.
        socket_id: Option<String>,
    },

    /// Any other authorization failure, including timeouts.
    #[error("authorization failed for channel '{channel}' (socket {socket_id:?}): {reason}")]
    AuthorizationFailure {
        /// The channel being authorized.
        channel: String,
        /// Socket id quoted to the authorizer.
        socket_id: Option<String>,
        /// What went wrong.
        reason: String,
    },

    /// The service rejected a subscription after it was requested.
    #[error("subscription to '{channel}' rejected: {message} (code {code:?})")]
    SubscriptionRefused {
        /// The channel that was rejected.
        channel: String,
        /// Service error code, when provided.
        code: Option<u16>,
        /// Service error message.
        message: String,
    },

    /// A pending subscription was cancelled by a later unsubscribe.
    #[error("subscription to '{channel}' was cancelled by a later unsubscribe")]
    SubscriptionCancelled {
        /// The cancelled channel.
        channel: String,
    },

    /// Payload decryption failed on an encrypted channel after subscribing.
    #[error("could not decrypt payload on channel '{channel}': {source}")]
    Decryption {
        /// The channel the payload arrived on.
        channel: String,
        /// The decryption failure.
        #[source]
        source: DecryptionError,
    },

    /// An operation was attempted on a channel that is not subscribed.
    #[error("channel '{channel}' is not subscribed")]
    NotSubscribed {
        /// The channel.
        channel: String,
    },

    /// A caller-supplied handler panicked.
    #[error("handler panicked in {context}: {message}")]
    HandlerPanicked {
        /// Which handler, and for what event/channel/state.
        context: String,
        /// The panic payload, when printable.
        message: String,
    },

    /// A contract violation at the call site.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Subscribing to a private or presence channel without an authorizer.
    #[error("an authorizer must be provided for private and presence channels (channel '{0}')")]
    MissingAuthorizer(String),

    /// A suspend-capable operation exceeded the configured client timeout.
    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Which operation timed out.
        operation: &'static str,
        /// The configured client timeout.
        timeout: Duration,
    },

    /// A malformed frame or payload.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A generic error frame from the service.
    #[error("service error: {message} (code {code:?})")]
    Service {
        /// Service error code, when provided.
        code: Option<u16>,
        /// Service error message.
        message: String,
    },
}

/// A listener on the shared error channel.
pub type ErrorListener = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// The shared error channel.
///
/// Every asynchronous fault in the client is delivered here exactly once.
/// Listeners are invoked over a snapshot of the registration list, each in
/// a protected scope; a panicking error listener is logged and skipped so
/// it cannot re-enter the reporter.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    listeners: Arc<Mutex<Vec<ErrorListener>>>,
}

impl ErrorReporter {
    /// Create an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an error listener, returning a handle usable for removal.
    pub fn subscribe(&self, listener: impl Fn(&ClientError) + Send + Sync + 'static) -> ErrorListener {
        let listener: ErrorListener = Arc::new(listener);
        self.listeners
            .lock()
            .expect("error listener lock poisoned")
            .push(listener.clone());
        listener
    }

    /// Remove a previously registered listener. Unknown handles are a no-op.
    pub fn unsubscribe(&self, listener: &ErrorListener) {
        self.listeners
            .lock()
            .expect("error listener lock poisoned")
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Deliver an error to every registered listener.
    pub fn report(&self, err: ClientError) {
        warn!(error = %err, "client error");
        let snapshot: Vec<ErrorListener> = self
            .listeners
            .lock()
            .expect("error listener lock poisoned")
            .clone();
        for listener in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(&err))) {
                error!(
                    panic = %panic_message(&panic),
                    "error listener panicked; skipping"
                );
            }
        }
    }
}

/// Extract a printable message from a panic payload.
#[must_use]
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run a caller-supplied handler in a protected scope.
///
/// A panic is converted to `ClientError::HandlerPanicked` carrying the
/// given context and routed to the reporter; it never propagates to the
/// calling frame-processing path.
pub(crate) fn guard_handler(reporter: &ErrorReporter, context: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        reporter.report(ClientError::HandlerPanicked {
            context: context.to_string(),
            message: panic_message(&*panic),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_report_reaches_all_listeners() {
        let reporter = ErrorReporter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        reporter.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        reporter.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ClientError::NotConnected);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_error_listener_is_isolated() {
        let reporter = ErrorReporter::new();
        let count = Arc::new(AtomicUsize::new(0));

        reporter.subscribe(|_| panic!("bad listener"));
        let c = count.clone();
        reporter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ClientError::NotConnected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let reporter = ErrorReporter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = reporter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        reporter.unsubscribe(&handle);
        reporter.unsubscribe(&handle);
        reporter.report(ClientError::NotConnected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_handler_reports_panics() {
        let reporter = ErrorReporter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        reporter.subscribe(move |e| {
            s.lock().unwrap().push(e.to_string());
        });

        guard_handler(&reporter, "connected delegate", || panic!("boom"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("connected delegate"));
        assert!(seen[0].contains("boom"));
    }
}
