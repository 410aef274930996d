//! Exponential backoff schedule.
//!
//! Shared by write retries and connection recovery: the delay starts at
//! a base, doubles per consumed attempt, and is capped. The attempt
//! counter resets on success.

use std::time::Duration;

/// An exponential backoff schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    /// Creates a schedule starting at `base`, doubling, capped at `cap`.
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Returns the delay for the current attempt and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(16); // avoid shift overflow long before cap anyway
        let delay = self
            .base
            .checked_mul(1u32 << exp)
            .unwrap_or(self.cap)
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Number of delays consumed since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Resets the schedule after a success.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
