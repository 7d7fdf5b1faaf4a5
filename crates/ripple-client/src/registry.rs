//! Bookkeeping for channel subscriptions.
//!
//! One `SubscriptionTable` per client, behind a single mutex that is the
//! serialization point for subscription state. The lock is only ever held
//! for short non-suspending sections; authorizer calls and socket traffic
//! happen outside it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::backlog::Backlog;
use crate::channel::Channel;
use crate::error::ClientError;

/// Where a subscription is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubState {
    /// Waiting in the backlog for a connection.
    Queued,
    /// An authorizer call is in flight.
    Authorizing,
    /// The subscribe frame went out; waiting for the service ack.
    SubscribeSent,
    /// Acknowledged by the service.
    Subscribed,
}

/// Why a subscription attempt did not reach `Subscribed`.
///
/// Cloneable so one failure can resolve every coalesced waiter.
#[derive(Debug, Clone)]
pub(crate) enum SubscribeFailure {
    Unauthorized {
        channel: String,
        socket_id: Option<String>,
    },
    AuthFailure {
        channel: String,
        socket_id: Option<String>,
        reason: String,
    },
    Refused {
        channel: String,
        code: Option<u16>,
        message: String,
    },
    Cancelled {
        channel: String,
    },
    Disconnected {
        channel: String,
    },
}

impl SubscribeFailure {
    pub(crate) fn into_error(self) -> ClientError {
        match self {
            SubscribeFailure::Unauthorized { channel, socket_id } => {
                ClientError::Unauthorized { channel, socket_id }
            }
            SubscribeFailure::AuthFailure {
                channel,
                socket_id,
                reason,
            } => ClientError::AuthorizationFailure {
                channel,
                socket_id,
                reason,
            },
            SubscribeFailure::Refused {
                channel,
                code,
                message,
            } => ClientError::SubscriptionRefused {
                channel,
                code,
                message,
            },
            SubscribeFailure::Cancelled { channel } => {
                ClientError::SubscriptionCancelled { channel }
            }
            SubscribeFailure::Disconnected { channel } => ClientError::AuthorizationFailure {
                channel,
                socket_id: None,
                reason: "connection lost before the subscription completed".to_string(),
            },
        }
    }
}

/// One waiter on a subscription outcome, keyed for targeted removal.
pub(crate) type Waiter = (u64, oneshot::Sender<Result<(), SubscribeFailure>>);

/// Per-channel subscription record.
pub(crate) struct ChannelSlot {
    pub(crate) channel: Arc<Channel>,
    pub(crate) state: SubState,
    pub(crate) waiters: Vec<Waiter>,
    /// Bumped on every fresh attempt. Results from a superseded attempt
    /// (stale authorizer call) are discarded by comparing against this.
    pub(crate) attempt: u64,
}

impl ChannelSlot {
    pub(crate) fn new(channel: Arc<Channel>, state: SubState) -> Self {
        Self {
            channel,
            state,
            waiters: Vec::new(),
            attempt: 0,
        }
    }

    /// Take the waiters for resolution outside the table lock.
    pub(crate) fn take_waiters(&mut self) -> Vec<Waiter> {
        std::mem::take(&mut self.waiters)
    }
}

/// The client's subscription state.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    pub(crate) channels: HashMap<String, ChannelSlot>,
    pub(crate) backlog: Backlog,
    next_waiter_id: u64,
}

impl SubscriptionTable {
    /// Allocate a unique waiter id.
    pub(crate) fn next_waiter_id(&mut self) -> u64 {
        self.next_waiter_id += 1;
        self.next_waiter_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_ids_are_unique() {
        let mut table = SubscriptionTable::default();
        let a = table.next_waiter_id();
        let b = table.next_waiter_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_failure_error_mapping() {
        let err = SubscribeFailure::Refused {
            channel: "private-chat".to_string(),
            code: Some(4009),
            message: "not authorized".to_string(),
        }
        .into_error();
        assert!(matches!(err, ClientError::SubscriptionRefused { code: Some(4009), .. }));

        let err = SubscribeFailure::Cancelled {
            channel: "lobby".to_string(),
        }
        .into_error();
        assert!(matches!(err, ClientError::SubscriptionCancelled { .. }));
    }
}
