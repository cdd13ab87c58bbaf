//! Exponential backoff owned by the monitor loop.

use std::time::Duration;

/// First retry delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Doubling backoff with a ceiling.
///
/// [`Backoff::on_failure`] hands out the delay to wait now and doubles the
/// next one; [`Backoff::reset`] goes back to the initial delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay that the next failure will return.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Records a success.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}
