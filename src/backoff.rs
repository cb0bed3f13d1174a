//! Exponential backoff policy for retry spacing.

use std::time::Duration;

/// Default base delay between retries: 5 seconds.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(5_000);

/// Pure mapping from attempt number to retry delay.
///
/// The base delay is a pool-wide constant so retry spacing stays
/// predictable across the system; it is not configurable per job.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with the given base delay.
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// The base delay.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, saturating.
    ///
    /// With the 5s default this yields 5s, 10s, 20s after attempts
    /// 1, 2, 3, so the delay before attempt `k` is `base * 2^(k-2)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent)
    }
}
