//! In-memory expiring cache for upstream records.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct CacheInner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    capacity: usize,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity,
        }
    }

    fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        if !self.map.contains_key(&key) && self.map.len() >= self.capacity {
            self.clear_expired(now);
        }
        while !self.map.contains_key(&key) && self.map.len() >= self.capacity {
            if !self.evict_soonest_expiring() {
                break;
            }
        }

        self.map.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    fn evict_soonest_expiring(&mut self) -> bool {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => self.map.remove(&key).is_some(),
            None => false,
        }
    }

    fn clear_expired(&mut self, now: Instant) {
        self.map.retain(|_, entry| entry.is_live(now));
    }
}

/// Bounded, thread-safe key/value store with a TTL per entry.
///
/// Reads treat an expired entry as absent. When an insert would exceed the
/// capacity, expired entries are dropped first and then the entries closest
/// to expiry are evicted.
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    inner: Arc<tokio::sync::RwLock<CacheInner<K, V>>>,
}

impl<K, V> Clone for ExpiringCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(capacity.max(1)))),
        }
    }

    /// Get the value for `key` unless it was never set or has expired.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let store = self.inner.read().await;
        store.get(key)
    }

    /// Insert or replace the value for `key`, live for `ttl` from now.
    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        let mut store = self.inner.write().await;
        store.put(key, value, ttl);
    }

    /// Drop the entry for `key`, returning whether one was present.
    pub async fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut store = self.inner.write().await;
        store.map.remove(key).is_some()
    }

    /// Remove expired entries from the cache.
    pub async fn clear_expired(&self) {
        let mut store = self.inner.write().await;
        store.clear_expired(Instant::now());
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Number of stored entries (including expired entries not yet purged).
    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn capacity(&self) -> usize {
        let store = self.inner.read().await;
        store.capacity
    }
}
