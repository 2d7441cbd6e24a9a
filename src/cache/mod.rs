//! Caches for expensive lookups
//!
//! Two shapes cover what collection clients memoize:
//!
//! - [`ValueCache`] holds one value, for low-cardinality resources such as the
//!   list of departments or a facet vocabulary.
//! - [`KeyedLruCache`] holds up to a fixed number of per-identifier values and
//!   evicts the least recently used one.
//!
//! Both guard their state with a single async mutex, so no caller observes a
//! partially applied read or write. Fetches performed through
//! [`ValueCache::get`] or [`KeyedLruCache::get_or_fetch`] run outside the lock;
//! only their successful result is stored. A failed fetch never touches the cache.

use serde::{Deserialize, Serialize};

pub mod keyed;
pub mod value;

pub use keyed::KeyedLruCache;
pub use value::ValueCache;

/// How a fetch-through lookup treats cached data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Return a cached value when present, fetch otherwise
    #[default]
    UseCache,
    /// Always fetch and overwrite the cached value
    Reload,
}

impl CachePolicy {
    /// Whether a cached value may be returned without fetching.
    pub fn allows_cached(&self) -> bool {
        matches!(self, CachePolicy::UseCache)
    }
}
