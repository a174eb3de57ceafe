//! Reconnect backoff calculation.
//!
//! Delay for attempt `n` is `min(max_delay, base_delay * 2^n)` plus a
//! non-negative jitter of up to `jitter_factor` of that value. The
//! un-jittered curve is non-decreasing in `n` and flat once capped.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default delay cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// What happens to the attempt counter when the operator calls `start()`
/// again after a `stop()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptPolicy {
    /// Every fresh start begins at attempt 0.
    #[default]
    ResetOnStart,
    /// The counter carries over, so a restart keeps its backed-off delay.
    Persist,
}

/// Exponential backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the un-jittered delay.
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter, clamped to 0.0–1.0.
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl BackoffPolicy {
    /// Policy without jitter.
    pub fn fixed(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: 0.0,
        }
    }

    /// Capped exponential delay for a zero-based `attempt`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let exponential = base_ms.saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(exponential.min(max_ms))
    }

    /// Delay for `attempt` with jitter drawn from `random` in `[0.0, 1.0)`.
    pub fn delay_for(&self, attempt: u32, random: f64) -> Duration {
        let capped = self.base_delay_for(attempt);
        let jitter = self.jitter_factor.clamp(0.0, 1.0) * random.clamp(0.0, 1.0);
        capped.mul_f64(1.0 + jitter)
    }

    /// Delay for `attempt` with jitter from the thread RNG.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_for(attempt, rand::random::<f64>())
    }
}
