//! Reconnect scheduling: exponential backoff plus a forced-wait floor.
//!
//! Two independent axes (§4.6): a retry-class floor (`reconnect_at`, set by
//! the server via close code, `admin_kick`, or `error`) and a fast-reconnect
//! exponential for transient failures. The floor always dominates.

use std::time::Duration;

use tokio::time::Instant;

pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    current: Duration,
    reconnect_at: Option<Instant>,
}

/// What the supervisor should do before the next connect attempt.
pub enum NextAttempt {
    /// Sleep for this long, then connect. The exponential component advances.
    Exponential(Duration),
    /// Sleep until the forced floor elapses. The exponential component is untouched.
    Forced(Duration),
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
            reconnect_at: None,
        }
    }

    /// Set an absolute forced-wait floor, `delay` from `now`.
    pub fn set_reconnect_at(&mut self, now: Instant, delay: Duration) {
        self.reconnect_at = Some(now + delay);
    }

    /// Reset on a successful transport open: exponential resets to base, the
    /// floor is cleared.
    pub fn on_successful_open(&mut self) {
        self.current = self.base;
        self.reconnect_at = None;
    }

    /// Compute what to wait for before the next connect attempt, given `now`.
    pub fn next_attempt(&mut self, now: Instant) -> NextAttempt {
        if let Some(at) = self.reconnect_at {
            if now < at {
                return NextAttempt::Forced(at - now);
            }
        }
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        NextAttempt::Exponential(delay)
    }

    #[cfg(test)]
    pub fn current(&self) -> Duration {
        self.current
    }
}
