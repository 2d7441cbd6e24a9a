//! Capacity-bounded keyed cache with least-recently-used eviction

use lru::LruCache;
use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

use super::CachePolicy;
use crate::fetcher::FetchResult;

/// LRU cache protected by a Tokio mutex.
///
/// Both [`get`](Self::get) and [`put`](Self::put) mark the key most recently
/// used. Once the cache holds `capacity` entries, inserting a new key evicts
/// exactly one entry: the least recently used.
pub struct KeyedLruCache<K, V> {
    inner: Mutex<LruCache<K, V>>,
    capacity: NonZeroUsize,
}

impl<K, V> KeyedLruCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// Build a cache if `capacity` is non-zero, returning `None` otherwise.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(Self::new)
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Clone of the value for `key`, marking it most recently used.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().await.get(key).cloned()
    }

    /// Insert or overwrite `key`, marking it most recently used.
    ///
    /// Returns the entry evicted to stay within capacity, if any. Overwriting an
    /// existing key evicts nothing.
    pub async fn put(&self, key: K, value: V) -> Option<(K, V)>
    where
        K: Clone,
    {
        let mut guard = self.inner.lock().await;
        match guard.push(key.clone(), value) {
            Some((old_key, old_value)) if old_key != key => Some((old_key, old_value)),
            _ => None,
        }
    }

    /// Remove `key`, returning its value.
    pub async fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().await.pop(key)
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// Return the cached value for `key` or fetch it, according to `policy`.
    ///
    /// A successful fetch is stored under `key`; a failed one leaves the cache
    /// untouched.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, policy: CachePolicy, fetch: F) -> FetchResult<V>
    where
        K: Clone + std::fmt::Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<V>>,
    {
        if policy.allows_cached() {
            if let Some(value) = self.get(&key).await {
                debug!(?key, "Keyed cache hit");
                return Ok(value);
            }
        }

        debug!(?key, ?policy, "Keyed cache fetching");
        let value = fetch().await?;
        if let Some((evicted, _)) = self.put(key, value.clone()).await {
            debug!(?evicted, "Evicted least recently used entry");
        }
        Ok(value)
    }
}
