//! # Collection Fetcher Library
//!
//! A resilient fetch engine for paginated museum-collection REST APIs. Every
//! collection client follows the same recipe: resolve the identifiers that match
//! a query (possibly across many pages), then fetch the full record for each
//! identifier with bounded parallelism. This crate implements that recipe once,
//! parameterized over the page-fetch and detail-fetch functions each API supplies.
//!
//! ## Features
//!
//! - **Retrying Transport**: exponential backoff for 429/5xx and network failures
//! - **Identifier Resolution**: accumulate identifiers across pages with guards
//!   against servers that misreport their totals
//! - **Windowed Streaming**: pull-based record stream with a fixed concurrency ceiling
//! - **Cooperative Cancellation**: a shared token checked at every checkpoint
//! - **Caching**: single-slot and LRU caches with serialized mutation
//!
//! ## Quick Start
//!
//! ```no_run
//! use collection_fetcher::cancellation::CancellationSource;
//! use collection_fetcher::fetcher::pagination::IdentifierResolver;
//! use collection_fetcher::fetcher::stream::stream_records;
//! use futures_util::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = CancellationSource::new();
//! let token = source.token();
//!
//! let ids = IdentifierResolver::resolve_all(
//!     |page, page_size| async move {
//!         // Call the collection search endpoint here
//!         Ok((3, vec![page as u64, page as u64 + 1, page as u64 + 2]))
//!     },
//!     100,
//!     &token,
//! )
//! .await?;
//!
//! let mut records = stream_records(ids, 4, |id| async move { Ok(id * 10) }, None, token);
//! while let Some(record) = records.next().await {
//!     println!("{}", record?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`cancellation`] - Cooperative cancellation source and read-only token
//! - [`fetcher`] - Transport, identifier resolution and the windowed record stream
//! - [`harvest`] - Configuration, progress reporting, rate limiting and orchestration
//! - [`cache`] - Value and keyed LRU caches with fetch-through policies
//! - [`metrics`] - Request and retry metrics emitted through the `metrics` facade

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// Cooperative cancellation shared by every component
pub mod cancellation;

/// Caches with serialized mutation
pub mod cache;

/// Transport, pagination and streaming
pub mod fetcher;

/// Harvest configuration and orchestration
pub mod harvest;

/// Observability metrics
pub mod metrics;

pub use cache::{CachePolicy, KeyedLruCache, ValueCache};
pub use cancellation::{CancellationSource, CancellationToken};
pub use fetcher::{FetchError, FetchResult, RecordStream};
pub use harvest::CollectionHarvester;

/// Opaque identifier naming one remote record.
///
/// Identifiers are never deduplicated; a server may return the same one on
/// several pages and every occurrence is fetched.
pub type Identifier = u64;

/// Snapshot of streaming progress, emitted once per successfully fetched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchProgress {
    /// Records fetched so far
    pub completed: usize,
    /// Records expected in total
    pub total: usize,
}

impl FetchProgress {
    /// Completion as a fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Whether every expected record has been fetched.
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}
