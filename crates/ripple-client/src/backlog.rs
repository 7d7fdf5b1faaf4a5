//! Ordered backlog of subscription operations taken while disconnected.
//!
//! Operations are replayed in request order on the next connection. A
//! later operation on the same channel cancels its pending opposite, so
//! subscribe-then-unsubscribe (and the reverse) leaves only the last
//! intent.

/// A deferred subscription operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingOp {
    Subscribe(String),
    Unsubscribe(String),
}

/// FIFO of deferred operations with last-writer-wins per channel.
#[derive(Debug, Default)]
pub(crate) struct Backlog {
    ops: Vec<PendingOp>,
}

impl Backlog {
    /// Queue a subscribe, cancelling any pending unsubscribe for the
    /// same channel. Already-queued subscribes are not duplicated.
    pub(crate) fn push_subscribe(&mut self, channel: &str) {
        self.ops
            .retain(|op| !matches!(op, PendingOp::Unsubscribe(c) if c == channel));
        if !self
            .ops
            .iter()
            .any(|op| matches!(op, PendingOp::Subscribe(c) if c == channel))
        {
            self.ops.push(PendingOp::Subscribe(channel.to_string()));
        }
    }

    /// Queue an unsubscribe, cancelling any pending subscribe for the
    /// same channel. Already-queued unsubscribes are not duplicated.
    pub(crate) fn push_unsubscribe(&mut self, channel: &str) {
        self.ops
            .retain(|op| !matches!(op, PendingOp::Subscribe(c) if c == channel));
        if !self
            .ops
            .iter()
            .any(|op| matches!(op, PendingOp::Unsubscribe(c) if c == channel))
        {
            self.ops.push(PendingOp::Unsubscribe(channel.to_string()));
        }
    }

    /// Drop any queued operation for the channel without replacing it.
    pub(crate) fn remove(&mut self, channel: &str) {
        self.ops.retain(|op| {
            !matches!(op, PendingOp::Subscribe(c) | PendingOp::Unsubscribe(c) if c == channel)
        });
    }

    /// Take every queued operation, in request order. The backlog is
    /// empty afterwards.
    pub(crate) fn drain(&mut self) -> Vec<PendingOp> {
        std::mem::take(&mut self.ops)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_request_order() {
        let mut backlog = Backlog::default();
        backlog.push_subscribe("alpha");
        backlog.push_subscribe("beta");
        backlog.push_unsubscribe("gamma");

        assert_eq!(
            backlog.drain(),
            vec![
                PendingOp::Subscribe("alpha".to_string()),
                PendingOp::Subscribe("beta".to_string()),
                PendingOp::Unsubscribe("gamma".to_string()),
            ]
        );
    }

    #[test]
    fn test_unsubscribe_cancels_pending_subscribe() {
        let mut backlog = Backlog::default();
        backlog.push_subscribe("alpha");
        backlog.push_unsubscribe("alpha");

        assert_eq!(
            backlog.drain(),
            vec![PendingOp::Unsubscribe("alpha".to_string())]
        );
    }

    #[test]
    fn test_subscribe_cancels_pending_unsubscribe() {
        let mut backlog = Backlog::default();
        backlog.push_unsubscribe("alpha");
        backlog.push_subscribe("alpha");

        assert_eq!(
            backlog.drain(),
            vec![PendingOp::Subscribe("alpha".to_string())]
        );
    }

    #[test]
    fn test_no_duplicates() {
        let mut backlog = Backlog::default();
        backlog.push_subscribe("alpha");
        backlog.push_subscribe("alpha");

        assert_eq!(
            backlog.drain(),
            vec![PendingOp::Subscribe("alpha".to_string())]
        );
    }

    #[test]
    fn test_drain_empties_the_backlog() {
        let mut backlog = Backlog::default();
        backlog.push_subscribe("alpha");
        backlog.drain();
        assert!(backlog.is_empty());
        assert!(backlog.drain().is_empty());
    }
}
