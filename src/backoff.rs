// src/backoff.rs
//! Explicit pacing and retry policy for outbound probes and oracle queries.
//!
//! `Backoff::delay_for(attempt)` is pure; `Pacer` does the actual sleeping and
//! can be built with zero delay for tests.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: u32,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    /// Same delay before every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1,
            max: delay,
            max_attempts: 1,
        }
    }

    pub fn exponential(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            factor: 2,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based): `base * factor^(attempt-1)`,
    /// capped at `max`. Attempt 0 never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let mult = self.factor.saturating_pow(attempt - 1);
        self.base.saturating_mul(mult).min(self.max)
    }

    /// Whether another attempt is allowed after `attempts_made`.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Sleeps between successive network calls. The first call goes out immediately.
#[derive(Debug, Clone)]
pub struct Pacer {
    gap: Duration,
    started: bool,
}

impl Pacer {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            started: false,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub async fn wait(&mut self) {
        if self.started && !self.gap.is_zero() {
            tokio::time::sleep(self.gap).await;
        }
        self.started = true;
    }
}
