//! Reconnection policy for dropped sockets.
//!
//! The policy is a plain value: it only decides. Scheduling the retry timer is
//! the WebSocket actor's job, which keeps this logic free of side effects and
//! easy to test.

use std::time::Duration;

/// Default maximum number of consecutive reconnection attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Default fixed delay before each reconnection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// What to do after a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Retry once the delay has elapsed
    RetryAfter(Duration),
    /// Stop retrying; the feature degrades silently
    GiveUp,
}

/// Bounded, fixed-backoff reconnection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    /// Number of retries scheduled since the last successful open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a closed connection and decide whether to retry.
    pub fn on_close(&mut self) -> ReconnectDecision {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            ReconnectDecision::RetryAfter(self.delay)
        } else {
            ReconnectDecision::GiveUp
        }
    }

    /// Record a successful open.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }
}
