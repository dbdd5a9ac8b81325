//! Retry policy for `call` steps (§4.3.3).
//!
//! Mirrors the shape of the teacher's `RetryPolicy` (exponential backoff,
//! builder methods) but follows the spec's exact formula: `delay =
//! retry_delay * retry_backoff^(attempt-2)`, with no cross-attempt retry
//! budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy derived from a `call` step's `retries`/`retry_delay`/
/// `retry_backoff` config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (i.e. `retries + 1`).
    pub max_attempts: u32,
    /// Base delay in seconds before the first retry.
    pub initial_delay_secs: f64,
    /// Multiplier applied per subsequent retry.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_secs: 1.0,
            backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based: the first retry is
    /// attempt 2). `delay = retry_delay * retry_backoff^(attempt-2)`, so the
    /// first retry pays the base delay with no multiplier.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2) as i32;
        let secs = self.initial_delay_secs * self.backoff.powi(exponent);
        Duration::from_secs_f64(secs.max(0.0))
    }

    pub fn has_attempts_remaining(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
