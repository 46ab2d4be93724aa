use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request budget for one upstream.
///
/// Waiting for capacity never fails a call; it only delays the next attempt.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    per_minute: u32,
    burst: u32,
}

impl RequestThrottle {
    pub fn per_minute(per_minute: u32, burst: u32) -> Self {
        let per_minute = non_zero(per_minute);
        let burst = non_zero(burst);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            per_minute: per_minute.get(),
            burst: burst.get(),
        }
    }

    /// Wait until one request fits the budget.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take one unit of budget if available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn limits(&self) -> (u32, u32) {
        (self.per_minute, self.burst)
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("per_minute", &self.per_minute)
            .field("burst", &self.burst)
            .finish()
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}
