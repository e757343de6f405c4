//! Bounded retry with exponential backoff.
//!
//! Sleeping goes through [`Clock`] so tests can assert the backoff schedule
//! without waiting for it.
use std::time::Duration;

/// How many times to retry a transient failure and how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-indexed).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let scaled_ms = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = scaled_ms.min(self.max_backoff.as_millis() as f64).max(0.0);
        Duration::from_millis(capped_ms.round() as u64)
    }
}

pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Real wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Final result of a retried operation plus the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails non-transiently, or the retry
/// budget is spent. `operation` receives the 1-indexed attempt number.
pub fn run_with_retry<T, E, F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    is_transient: fn(&E) -> bool,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if is_transient(&err) && attempt <= policy.max_retries => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                clock.sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                }
            }
        }
    }
}
