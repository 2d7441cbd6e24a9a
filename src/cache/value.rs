//! Single-slot cache

use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

use super::CachePolicy;
use crate::fetcher::FetchResult;

/// Cache holding zero or one value.
#[derive(Debug)]
pub struct ValueCache<V> {
    slot: Mutex<Option<V>>,
}

impl<V> Default for ValueCache<V> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<V: Clone> ValueCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The held value, if any.
    pub async fn read(&self) -> Option<V> {
        self.slot.lock().await.clone()
    }

    /// Replace the held value.
    pub async fn store(&self, value: V) {
        *self.slot.lock().await = Some(value);
    }

    /// Empty the cache.
    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }

    /// Return the cached value or fetch it, according to `policy`.
    ///
    /// On success the fetched value replaces whatever was cached. On failure the
    /// cache is left untouched and the error is returned.
    pub async fn get<F, Fut>(&self, policy: CachePolicy, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<V>>,
    {
        if policy.allows_cached() {
            if let Some(value) = self.read().await {
                debug!("Value cache hit");
                return Ok(value);
            }
        }

        debug!(?policy, "Value cache fetching");
        let value = fetch().await?;
        self.store(value.clone()).await;
        Ok(value)
    }
}
