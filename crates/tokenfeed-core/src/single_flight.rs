//! Request coalescing: at most one in-flight load per key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use tracing::debug;

/// Deduplicates concurrent loads of the same key.
///
/// The first caller for a key starts the load; callers arriving while it is
/// running await the same future and receive a clone of its output. The map
/// only keeps a weak handle, so when every caller abandons a load the load
/// itself is dropped (cancelled) and the next caller starts a fresh one.
pub struct SingleFlight<T> {
    in_flight: Mutex<InFlightMap<T>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.in_flight_len())
            .finish()
    }
}

type InFlightMap<T> = HashMap<String, WeakShared<BoxFuture<'static, T>>>;

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a registered load.
    pub fn in_flight_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InFlightMap<T>> {
        self.in_flight
            .lock()
            .expect("single-flight map lock is not poisoned")
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `load` for `key` unless a load for the same key is already running,
    /// in which case join it instead.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.lock();
            match in_flight.get(key).and_then(WeakShared::upgrade) {
                Some(existing) => {
                    debug!(key, "joining in-flight load");
                    existing
                }
                None => {
                    let shared = load().boxed().shared();
                    if let Some(weak) = shared.downgrade() {
                        in_flight.insert(key.to_owned(), weak);
                    }
                    shared
                }
            }
        };

        let output = shared.clone().await;
        self.forget(key, &shared);
        output
    }

    fn forget(&self, key: &str, finished: &Shared<BoxFuture<'static, T>>) {
        let mut in_flight = self.lock();
        let stale = match in_flight.get(key).map(WeakShared::upgrade) {
            Some(Some(current)) => current.ptr_eq(finished),
            Some(None) => true,
            None => false,
        };
        if stale {
            in_flight.remove(key);
        }
    }
}
