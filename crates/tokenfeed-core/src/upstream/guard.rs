use std::future::Future;

use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::error::UpstreamError;
use crate::retry::{RetryPolicy, RetryingTransport};
use crate::throttling::RequestThrottle;

/// Breaker, retry schedule and optional request budget for one upstream endpoint.
///
/// A call first asks the breaker for a permit, then runs the retry loop, and
/// reports one outcome for the whole loop. Only transient failures (including
/// exhausted retries) count against the upstream; a not-found or a malformed
/// payload proves the endpoint answered and is recorded as a success.
#[derive(Debug)]
pub struct UpstreamGuard {
    breaker: CircuitBreaker,
    transport: RetryingTransport,
    throttle: Option<RequestThrottle>,
}

impl UpstreamGuard {
    pub fn new(name: impl Into<String>, breaker: CircuitBreakerConfig, retry: RetryPolicy) -> Self {
        Self {
            breaker: CircuitBreaker::new(name, breaker),
            transport: RetryingTransport::new(retry),
            throttle: None,
        }
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.transport.policy()
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.breaker.consecutive_failures()
    }

    pub async fn call<T, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let Some(permit) = self.breaker.try_acquire() else {
            debug!(upstream = self.name(), "circuit open, failing fast");
            return Err(UpstreamError::CircuitOpen {
                upstream: self.name().to_owned(),
            });
        };

        let throttle = self.throttle.as_ref();
        let outcome = self
            .transport
            .execute(|| {
                let attempt = operation();
                async move {
                    if let Some(throttle) = throttle {
                        throttle.acquire().await;
                    }
                    attempt.await
                }
            })
            .await;

        match &outcome {
            Err(error) if error.counts_against_upstream() => permit.record_failure(),
            _ => permit.record_success(),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::error::TransientError;

    fn guard(threshold: u32) -> UpstreamGuard {
        UpstreamGuard::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(60),
            },
            RetryPolicy::no_retry(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_never_invokes_operation() {
        let guard = guard(1);
        let calls = AtomicU32::new(0);

        let _ = guard
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::from(TransientError::network("down")))
            })
            .await;
        let second = guard
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(guard.state(), CircuitState::Open);
        assert!(matches!(second, Err(UpstreamError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_does_not_trip_breaker() {
        let guard = guard(1);

        let outcome = guard
            .call(|| async { Err::<(), _>(UpstreamError::not_found("coin 'nope'")) })
            .await;

        assert!(matches!(outcome, Err(UpstreamError::NotFound { .. })));
        assert_eq!(guard.state(), CircuitState::Closed);
        assert_eq!(guard.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_call_is_not_a_failure() {
        let guard = guard(1);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            guard.call(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, UpstreamError>(())
            }),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(guard.state(), CircuitState::Closed);
        assert_eq!(guard.consecutive_failures(), 0);
    }
}
