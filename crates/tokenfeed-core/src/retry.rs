//! Retry logic with exponential backoff and rate-limit cooldown.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{TransientError, UpstreamError};

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ retry)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry (0-based: the wait after the first failure is retry 0).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(retry.min(i32::MAX as u32) as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = if seconds.is_finite() {
                    seconds.min(max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };

                let mut delay =
                    Duration::try_from_secs_f64(capped_seconds.max(0.0)).unwrap_or(max);

                // +/- 50% of the delay
                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Immutable retry configuration for one upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Backoff between attempts.
    pub backoff: Backoff,
    /// Extra wait after an explicit rate-limit signal, on top of the backoff.
    pub rate_limit_cooldown: Duration,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            rate_limit_cooldown: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential policy: attempt `k` is followed by a wait of `base_delay * multiplier^(k-1)`.
    pub fn exponential(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                base: base_delay,
                factor: multiplier,
                max: Duration::MAX,
                jitter: false,
            },
            ..Self::default()
        }
    }

    /// A single attempt with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Wait after the failed 1-indexed `attempt`, before the next one.
    pub fn delay_after_attempt(&self, attempt: u32, error: &TransientError) -> Duration {
        let backoff = self.backoff.delay(attempt.saturating_sub(1));
        if error.is_rate_limit() {
            backoff.saturating_add(self.rate_limit_cooldown)
        } else {
            backoff
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs one logical network call with bounded, time-limited, backed-off retries.
///
/// Only [`UpstreamError::Transient`] outcomes are retried; every other error
/// is returned unchanged on the attempt that produced it. Dropping the
/// returned future cancels the in-flight attempt and the remaining schedule.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, operation()).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(TransientError::timeout(format!(
                    "attempt exceeded {:.1}s",
                    self.policy.attempt_timeout.as_secs_f64()
                ))
                .into()),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(UpstreamError::Transient(error)) => error,
                Err(other) => return Err(other),
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %error, "retries exhausted");
                return Err(UpstreamError::RetriesExhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.policy.delay_after_attempt(attempt, &error);
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
