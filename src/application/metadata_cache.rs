// Metadata cache - TTL entries with single-flight request coalescing
//
// Shields a slow backing store from repeated hierarchy lookups: N
// concurrent callers for the same absent or stale key produce exactly
// one backing-store call. The mutex guards only the two maps and is
// never held across a fetch await, so a slow fetch on one key cannot
// block lookups for other keys. Fetches run as detached tasks: a caller
// that abandons its request stops listening, the remaining waiters
// still receive the result.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex};

use crate::application::clock::Clock;
use crate::error::TelemetryError;

type FetchResult<V> = Result<V, TelemetryError>;

/// Replaced wholesale on refresh, never mutated in place.
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// One in-flight fetch per key; removed on completion regardless of
    /// how many callers were waiting.
    pending: HashMap<String, watch::Receiver<Option<FetchResult<V>>>>,
}

/// String-keyed cache with per-call TTLs. The entry map and pending map
/// are owned exclusively by this struct; construction starts empty and
/// the owner wires one instance through dependency injection, there is
/// no process-wide singleton.
pub struct CoalescingCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> CoalescingCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                pending: HashMap::new(),
            })),
            clock,
        }
    }

    /// Return the cached value for `key` if fresh, otherwise fetch it.
    /// A stale entry behaves exactly like an absent one. Failed fetches
    /// are never cached; every waiter of the failed fetch receives the
    /// error and the next call retries fresh.
    pub async fn get_with<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let mut rx = {
            // Check-then-create for both maps happens under one lock
            // acquisition so two callers can never both observe "absent"
            // and both start a fetch.
            let mut inner = self.inner.lock().await;
            if let Some(entry) = inner.entries.get(key) {
                if self.clock.now() < entry.expires_at {
                    tracing::debug!(key, "metadata cache hit");
                    return Ok(entry.value.clone());
                }
            }
            if let Some(rx) = inner.pending.get(key) {
                tracing::debug!(key, "joining in-flight metadata fetch");
                rx.clone()
            } else {
                tracing::debug!(key, "metadata cache miss, fetching");
                let (tx, rx) = watch::channel(None);
                inner.pending.insert(key.to_string(), rx.clone());
                self.spawn_fetch(key.to_string(), ttl, tx, fetch());
                rx
            }
        };

        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Fetch task ended without publishing (panicked).
                return Err(TelemetryError::StoreUnavailable(
                    "metadata fetch ended without a result".to_string(),
                ));
            }
        }
    }

    fn spawn_fetch<Fut>(
        &self,
        key: String,
        ttl: Duration,
        tx: watch::Sender<Option<FetchResult<V>>>,
        fut: Fut,
    ) where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            // The fetch runs in its own task so a panic inside it is
            // contained as a JoinError here and the pending slot still
            // gets cleaned up; otherwise the key would be stuck joining
            // a dead receiver forever.
            let result = match tokio::spawn(fut).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    tracing::warn!(key = %key, error = %err, "metadata fetch failed");
                    Err(TelemetryError::StoreUnavailable(err.to_string()))
                }
                Err(join_err) => {
                    tracing::warn!(key = %key, error = %join_err, "metadata fetch panicked");
                    Err(TelemetryError::StoreUnavailable(format!(
                        "metadata fetch panicked: {}",
                        join_err
                    )))
                }
            };
            let mut inner = inner.lock().await;
            if let Ok(value) = &result {
                inner.entries.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        expires_at: clock.now() + ttl,
                    },
                );
            }
            // Remove the pending slot before releasing the lock so a
            // late caller either sees the fresh entry or starts a new
            // fetch; waiters already attached keep their receivers.
            inner.pending.remove(&key);
            let _ = tx.send(Some(result));
        });
    }
}
