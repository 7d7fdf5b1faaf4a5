//! Reconnect backoff policy.
//!
//! After an unsolicited socket closure the client waits an exponentially
//! increasing delay before redialing: the delay starts at a fixed
//! increment, doubles per failed attempt, is capped at a fixed ceiling,
//! and resets to the start once a connection succeeds.

use std::time::Duration;

/// Default initial reconnect delay.
pub const DEFAULT_INCREMENT: Duration = Duration::from_secs(1);

/// Default reconnect delay ceiling.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(10);

/// Exponential reconnect backoff with a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    increment: Duration,
    ceiling: Duration,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff policy.
    #[must_use]
    pub fn new(increment: Duration, ceiling: Duration) -> Self {
        Self {
            increment,
            ceiling,
            attempt: 0,
        }
    }

    /// Get the delay before the next reconnect attempt and advance.
    pub fn next_delay(&mut self) -> Duration {
        let millis = self.increment.as_millis() as u64;
        let factor = 2u64.saturating_pow(self.attempt);
        let delay = Duration::from_millis(
            millis
                .saturating_mul(factor)
                .min(self.ceiling.as_millis() as u64),
        );
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Number of failed attempts since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_INCREMENT, DEFAULT_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), DEFAULT_INCREMENT);
    }

    #[test]
    fn test_backoff_no_overflow_on_many_attempts() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        for _ in 0..100 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_secs(10));
        }
    }
}
