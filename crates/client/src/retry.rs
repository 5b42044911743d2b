//! Reconnect delay policy.
//!
//! The device's only recovery strategy is "reconnect forever"; there is no
//! attempt cap and no escalating backoff. The delay is still injectable so
//! tests can run the restart loop at near-zero speed.

use std::time::Duration;

/// Fixed delay applied between a session ending and the next attempt.
#[derive(Debug, Clone)]
pub struct RetryDelay {
    delay: Duration,
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}

impl RetryDelay {
    /// A policy that always waits `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the next reconnect attempt.
    pub fn next_delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_two_seconds() {
        assert_eq!(RetryDelay::default().next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let p = RetryDelay::fixed(Duration::from_millis(10));
        assert_eq!(p.next_delay(), Duration::from_millis(10));
        assert_eq!(p.next_delay(), Duration::from_millis(10));
    }
}
