//! Cache-aside reads with per-key request coalescing.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::cache::ExpiringCache;
use crate::error::UpstreamError;
use crate::single_flight::SingleFlight;

/// One operation class of an upstream: its cache, its TTL and its in-flight loads.
///
/// A miss runs the fetch at most once per key no matter how many callers
/// arrive concurrently. Errors are shared with every waiter but never cached.
#[derive(Debug)]
pub struct ReadThrough<V> {
    cache: ExpiringCache<String, V>,
    flights: SingleFlight<Result<V, UpstreamError>>,
    ttl: Duration,
}

impl<V> ReadThrough<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: ExpiringCache::new(capacity),
            flights: SingleFlight::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cache(&self) -> &ExpiringCache<String, V> {
        &self.cache
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, UpstreamError>> + Send + 'static,
    {
        if let Some(value) = self.cache.get(key).await {
            return Ok(value);
        }

        debug!(key, "cache miss");
        let cache = self.cache.clone();
        let ttl = self.ttl;
        let owned_key = key.to_owned();

        self.flights
            .run(key, move || {
                let fetching = fetch();
                async move {
                    // A flight that finished between our miss and this load already filled the cache.
                    if let Some(value) = cache.get(owned_key.as_str()).await {
                        return Ok(value);
                    }
                    let value = fetching.await?;
                    cache.put(owned_key, value.clone(), ttl).await;
                    Ok(value)
                }
            })
            .await
    }
}
