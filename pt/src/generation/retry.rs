//! Bounded retry with exponential backoff and jitter
//!
//! Only rate limiting (HTTP 429) is retried. Every other failure ends the
//! submission on the attempt it happened.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::GenerationError;
use crate::config::RetryConfig;
use crate::llm::LlmError;

/// Retry budget and delay curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }

    /// Full delay after failed attempt `attempt`: backoff plus fresh jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff(attempt).saturating_add(self.jitter())
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out
    ///
    /// There is no sleep after the final attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        debug!(max_attempts = self.max_attempts, "run: called");
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    debug!(attempt, "run: success");
                    return Ok(value);
                }
                Err(err) if err.is_rate_limited() => {
                    if attempt >= self.max_attempts {
                        warn!(attempts = attempt, "run: rate limit budget exhausted");
                        return Err(GenerationError::RateLimitExhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "run: rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempt, error = %err, "run: terminal failure");
                    return Err(err.into());
                }
            }
        }
    }
}
