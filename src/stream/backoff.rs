//! Reconnect delay schedule.

use std::time::Duration;

/// Default reconnect delays, indexed by consecutive failures.
pub const DEFAULT_DELAYS: [Duration; 5] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

/// Walks an ordered delay table, holding at the last entry.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    delays: Vec<Duration>,
    failures: usize,
}

impl ReconnectBackoff {
    /// An empty table falls back to [`DEFAULT_DELAYS`].
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays = if delays.is_empty() {
            DEFAULT_DELAYS.to_vec()
        } else {
            delays
        };
        Self {
            delays,
            failures: 0,
        }
    }

    /// Delay before the next attempt; counts one more consecutive failure.
    pub fn next_delay(&mut self) -> Duration {
        let index = self.failures.min(self.delays.len() - 1);
        self.failures = self.failures.saturating_add(1);
        self.delays[index]
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn consecutive_failures(&self) -> usize {
        self.failures
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_DELAYS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_table_then_holds_at_max() {
        let mut backoff = ReconnectBackoff::default();
        let seen: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(seen, vec![1, 2, 5, 10, 30, 30, 30, 30]);
    }

    #[test]
    fn reset_returns_to_first_entry() {
        let mut backoff = ReconnectBackoff::new(vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        backoff.reset();
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn empty_table_uses_defaults() {
        let mut backoff = ReconnectBackoff::new(Vec::new());
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
