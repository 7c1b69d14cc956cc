//! Exponential backoff for idempotent external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FinalFailure;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
        }
    }

    /// Wait after the failed attempt number `attempt` (0-based):
    /// `initial_delay * multiplier^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }

    /// Every wait a fully failing run goes through, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|attempt| self.delay_after(attempt))
    }

    /// Runs `operation` until it succeeds or the attempt budget is spent.
    ///
    /// Sleeps are `tokio::time::sleep`, so nothing else is held up while
    /// waiting. Only use this for operations that are safe to repeat.
    pub async fn run_with_backoff<F, Fut, T, E>(&self, mut operation: F) -> Result<T, FinalFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(
                        "🔄 Attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        error
                    );
                    if attempt + 1 >= self.max_attempts {
                        return Err(FinalFailure {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }
                    tokio::time::sleep(self.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
