//! # Retry Backoff
//!
//! Exponential backoff with symmetric jitter for rescheduling failed
//! attempts. Kept separate from the state machine so "what state is legal"
//! and "how long to wait" stay independently testable.

use rand::Rng;
use std::time::Duration;

/// Delay cap applied before jitter
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default base delay for the first retry
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Compute the delay before re-attempting, for a zero-based attempt count:
/// `min(base_delay * 2^attempt, max_delay)` with uniform jitter in
/// `[0.8x, 1.2x]` so many orders failing at once do not retry in lockstep.
pub fn calculate_backoff(attempt: u32, base_delay_ms: u64) -> Duration {
    calculate_backoff_capped(attempt, base_delay_ms, DEFAULT_MAX_DELAY_MS)
}

/// `calculate_backoff` with an explicit cap
pub fn calculate_backoff_capped(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let exponential = (base_delay_ms as u128) << attempt.min(63);
    let capped = exponential.min(max_delay_ms as u128) as u64;

    let jitter: f64 = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_millis((capped as f64 * jitter).round() as u64)
}

/// Retry policy consumed by the worker pool: attempt ceiling plus backoff
/// shape, sourced from configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: i32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the given zero-based re-attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff_capped(attempt, self.base_delay_ms, self.max_delay_ms)
    }

    /// Whether the attempt ceiling is exhausted after `attempts_made` tries
    pub fn is_exhausted(&self, attempts_made: i32) -> bool {
        attempts_made >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_within_jitter_bounds() {
        // attempt 0: 1000ms +/- 20%
        let ms = calculate_backoff(0, 1000).as_millis() as u64;
        assert!((800..=1200).contains(&ms), "got {ms}");

        // attempt 1: 2000ms +/- 20%
        let ms = calculate_backoff(1, 1000).as_millis() as u64;
        assert!((1600..=2400).contains(&ms), "got {ms}");

        // attempt 2: 4000ms +/- 20%
        let ms = calculate_backoff(2, 1000).as_millis() as u64;
        assert!((3200..=4800).contains(&ms), "got {ms}");
    }

    #[test]
    fn test_cap_holds_for_large_attempts() {
        for attempt in [10, 32, 63, u32::MAX] {
            let ms = calculate_backoff(attempt, 1000).as_millis() as u64;
            assert!(ms <= 36_000, "attempt {attempt} exceeded cap: {ms}");
        }
    }

    #[test]
    fn test_jitter_varies() {
        let delays: Vec<u64> = (0..10)
            .map(|_| calculate_backoff(1, 1000).as_millis() as u64)
            .collect();
        let first = delays[0];
        assert!(
            delays.iter().any(|d| *d != first),
            "expected jitter to vary: {delays:?}"
        );
    }

    #[test]
    fn test_custom_base_delay() {
        let ms = calculate_backoff(0, 500).as_millis() as u64;
        assert!((400..=600).contains(&ms), "got {ms}");
    }

    #[test]
    fn test_policy_exhaustion() {
        let policy = RetryPolicy::new(3, 1000, 30_000);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
