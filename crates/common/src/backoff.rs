//! Backoff strategies for spacing out retry attempts.
//!
//! The engine's retry *policy* (what is retried, how many times, in which
//! order) is fixed; the delay between connectivity retries is pluggable
//! through [`BackoffStrategy`]. Tests use [`BackoffStrategy::None`] to keep
//! retry loops fast.

use std::time::Duration;

/// Delay calculation between retry attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between attempts.
    None,
    /// Fixed delay between attempts.
    Fixed(Duration),
    /// Linear backoff: `initial_delay + (attempt * increment)`.
    Linear {
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Added delay per subsequent retry.
        increment: Duration,
    },
    /// Exponential backoff: `initial_delay * base^attempt`, capped.
    Exponential {
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Growth factor per retry.
        base: f64,
        /// Upper bound on any single delay.
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate the delay preceding the given retry (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::Linear { initial_delay, increment } => {
                *initial_delay + increment.saturating_mul(attempt)
            }
            Self::Exponential { initial_delay, base, max_delay } => {
                let delay = initial_delay.as_millis() as f64 * base.powi(attempt as i32);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }

    /// Whether the strategy ever sleeps.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for BackoffStrategy {
    /// Small exponential curve suitable for interactive clients.
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_millis(100),
            base: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}
