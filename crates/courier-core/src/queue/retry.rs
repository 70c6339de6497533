//! Retry policy: decides backoff delays.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff with a cap and optional additive jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(with = "crate::config::duration_secs")]
    pub base_delay: Duration,

    /// Growth factor between consecutive retries.
    pub multiplier: f64,

    /// Upper bound for any single delay, jitter included.
    #[serde(with = "crate::config::duration_secs")]
    pub max_delay: Duration,

    /// Fraction of the computed delay added at random (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Plain doubling from `base_delay`, no jitter, capped at `max_delay`.
    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier: 2.0,
            max_delay,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait before the next retry.
    ///
    /// `retries_done` counts retries already performed, so the first retry
    /// uses 0: `base_delay * multiplier^retries_done`.
    ///
    /// With base=1s, multiplier=2.0 and no jitter:
    /// - first retry: 1s
    /// - second retry: 2s
    /// - third retry: 4s
    pub fn next_delay(&self, retries_done: u32) -> Duration {
        let exponent = i32::try_from(retries_done).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        self.apply_jitter(delay)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter;
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        (delay + Duration::from_secs_f64(extra)).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[rstest]
    #[case::first_retry(0, 1)]
    #[case::second_retry(1, 2)]
    #[case::third_retry(2, 4)]
    #[case::fourth_retry(3, 8)]
    fn exponential_backoff_doubles(#[case] retries_done: u32, #[case] secs: u64) {
        assert_eq!(no_jitter().next_delay(retries_done), Duration::from_secs(secs));
    }

    #[test]
    fn delay_is_capped() {
        let policy = no_jitter();
        assert_eq!(policy.next_delay(10), Duration::from_secs(60));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn jitter_only_adds_and_respects_bounds() {
        let policy = no_jitter().with_jitter(0.5);
        for _ in 0..100 {
            let d = policy.next_delay(1);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(3));
        }
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(5))
            .with_jitter(1.0);
        for _ in 0..100 {
            assert!(policy.next_delay(8) <= Duration::from_secs(5));
        }
    }
}
