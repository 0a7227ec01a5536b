//! Retry backoff policy
//!
//! Bounded exponential backoff with uniform jitter, formatted as the
//! engine's ISO-8601 duration representation (`PT<seconds>S`).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter_secs: default_jitter_secs(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_initial_delay_secs() -> u64 {
    60
}

fn default_max_delay_secs() -> u64 {
    900
}

fn default_jitter_secs() -> u64 {
    5
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryPolicy {
    /// Attempt number for a job: zero on the first failure, increasing as
    /// the remaining retry budget shrinks.
    pub fn attempt_for(initial_retries: u32, retries_remaining: i32) -> u32 {
        (i64::from(initial_retries) - i64::from(retries_remaining)).max(0) as u32
    }

    /// Backoff for the given attempt: `initial * multiplier^attempt`
    /// clamped to the maximum, plus uniform jitter in `[0, jitter]`
    /// seconds, clamped again, with a one-second floor.
    pub fn compute_backoff(&self, attempt: u32) -> Duration {
        let base =
            self.initial_delay_secs as f64 * self.backoff_multiplier.powi(attempt.min(64) as i32);
        let bounded = (base.round() as u64).min(self.max_delay_secs);
        let jitter = if self.jitter_secs > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_secs)
        } else {
            0
        };
        let seconds = bounded.saturating_add(jitter).min(self.max_delay_secs).max(1);
        Duration::from_secs(seconds)
    }
}

/// Engine-compatible duration formatting with a one-second floor.
pub fn format_iso_duration(duration: Duration) -> String {
    format!("PT{}S", duration.as_secs().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            initial_delay_secs: 60,
            max_delay_secs: 900,
            jitter_secs: 0,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_until_saturation() {
        let policy = no_jitter();
        assert_eq!(policy.compute_backoff(0), Duration::from_secs(60));
        assert_eq!(policy.compute_backoff(1), Duration::from_secs(120));
        assert_eq!(policy.compute_backoff(2), Duration::from_secs(240));
        assert_eq!(policy.compute_backoff(3), Duration::from_secs(480));
        assert_eq!(policy.compute_backoff(4), Duration::from_secs(900));
        assert_eq!(policy.compute_backoff(30), Duration::from_secs(900));
    }

    #[test]
    fn test_backoff_monotone_and_bounded_with_jitter() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = policy.compute_backoff(attempt);
            assert!(delay.as_secs() >= 1);
            assert!(delay.as_secs() <= policy.max_delay_secs);
            // Jitter never exceeds one multiplier step, so the lower bound
            // of each attempt dominates the upper bound of the previous.
            assert!(delay.as_secs() + policy.jitter_secs + 1 > previous.as_secs());
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_floor_is_one_second() {
        let policy = RetryPolicy {
            initial_delay_secs: 0,
            max_delay_secs: 10,
            jitter_secs: 0,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.compute_backoff(0), Duration::from_secs(1));
    }

    #[test]
    fn test_attempt_derivation() {
        assert_eq!(RetryPolicy::attempt_for(3, 3), 0);
        assert_eq!(RetryPolicy::attempt_for(3, 2), 1);
        assert_eq!(RetryPolicy::attempt_for(3, 0), 3);
        // Budget already below zero never produces a negative attempt.
        assert_eq!(RetryPolicy::attempt_for(3, 5), 0);
    }

    #[test]
    fn test_iso_duration_formatting() {
        assert_eq!(format_iso_duration(Duration::from_secs(90)), "PT90S");
        assert_eq!(format_iso_duration(Duration::ZERO), "PT1S");
    }
}
