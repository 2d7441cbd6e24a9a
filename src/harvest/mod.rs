//! Harvest orchestration, configuration and rate limiting
//!
//! A harvest is the workflow every collection client runs:
//!
//! 1. **Resolve**: page through the search endpoint with
//!    [`IdentifierResolver`](crate::fetcher::IdentifierResolver)
//! 2. **Stream**: fetch each record with
//!    [`stream_records`](crate::fetcher::stream_records) in bounded windows
//! 3. **Report**: log throttled progress through [`progress::ProgressReporter`]
//!
//! [`CollectionHarvester`] ties the three together under one
//! [`config::HarvestConfig`] and one cancellation token.
//!
//! # Quick Start
//!
//! ```no_run
//! use collection_fetcher::harvest::{config::HarvestConfig, CollectionHarvester};
//! use collection_fetcher::FetchError;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Search {
//!     total: usize,
//!     #[serde(rename = "objectIDs")]
//!     object_ids: Option<Vec<u64>>,
//! }
//!
//! #[derive(Deserialize)]
//! struct Artwork {
//!     title: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let harvester = CollectionHarvester::new(HarvestConfig::default().with_concurrency(4));
//! let transport = harvester.transport();
//! let detail = transport.clone();
//!
//! let artworks: Vec<Artwork> = harvester
//!     .harvest_all(
//!         move |_page, _size| {
//!             let transport = transport.clone();
//!             async move {
//!                 let search: Search = transport
//!                     .get_json("https://collection.example.org/search", &[("q", "sunflowers".into())])
//!                     .await?;
//!                 Ok::<_, FetchError>((search.total, search.object_ids.unwrap_or_default()))
//!             }
//!         },
//!         move |id| {
//!             let transport = detail.clone();
//!             async move {
//!                 transport
//!                     .get_json(&format!("https://collection.example.org/objects/{id}"), &[])
//!                     .await
//!             }
//!         },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`config`] - Defaults, retry policy and environment overrides
//! - [`progress`] - Throttled progress logging
//! - [`rate_limit`] - Client-side request throttling

use futures_util::{stream, StreamExt};
use std::future::Future;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::fetcher::pagination::{IdentifierResolver, Page};
use crate::fetcher::{stream_records, FetchResult, ProgressHook, RecordStream, RetryingTransport};
use crate::metrics::HarvestMetrics;
use crate::Identifier;

pub mod config;
pub mod progress;
pub mod rate_limit;

pub use config::{ConfigError, HarvestConfig, RetryPolicy, TransportConfig};
pub use progress::ProgressReporter;
pub use rate_limit::{RateLimitError, RateLimiter};

const DEFAULT_LABEL: &str = "records";

/// Runs resolve-then-stream harvests under one configuration
pub struct CollectionHarvester {
    config: HarvestConfig,
    cancellation: CancellationToken,
    progress: Option<ProgressHook>,
    label: String,
}

impl CollectionHarvester {
    /// Create a harvester that cannot be cancelled and logs its own progress.
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            cancellation: CancellationToken::none(),
            progress: None,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Observe `token` in every component.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Send progress to `hook` instead of the built-in progress log.
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// Name the records in log lines (e.g. "artworks").
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Token observed by this harvester.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Transport configured for this harvest, sharing its cancellation token.
    pub fn transport(&self) -> RetryingTransport {
        RetryingTransport::new(self.config.transport.clone()).with_cancellation(self.cancellation.clone())
    }

    /// Resolve every identifier from the configured start page.
    pub async fn resolve<P, PFut>(&self, page_fetch: P) -> FetchResult<Vec<Identifier>>
    where
        P: FnMut(u32, u32) -> PFut,
        PFut: Future<Output = FetchResult<Page>>,
    {
        IdentifierResolver::resolve_from(
            self.config.start_page,
            page_fetch,
            self.config.page_size,
            &self.cancellation,
        )
        .await
    }

    /// Stream records for already resolved identifiers.
    pub fn stream<T, D, DFut>(&self, ids: Vec<Identifier>, detail_fetch: D) -> RecordStream<T>
    where
        T: Send + 'static,
        D: Fn(Identifier) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let progress = self
            .progress
            .clone()
            .unwrap_or_else(|| Arc::new(ProgressReporter::new(self.label.clone(), ids.len())).into_hook());
        stream_records(
            ids,
            self.config.concurrency,
            detail_fetch,
            Some(progress),
            self.cancellation.clone(),
        )
    }

    /// Resolve identifiers, then return the record stream for them.
    ///
    /// The harvest counts as completed when the stream ends cleanly and as
    /// failed when it yields an error. A stream dropped early records neither.
    pub async fn harvest<T, P, PFut, D, DFut>(&self, page_fetch: P, detail_fetch: D) -> FetchResult<RecordStream<T>>
    where
        T: Send + 'static,
        P: FnMut(u32, u32) -> PFut,
        PFut: Future<Output = FetchResult<Page>>,
        D: Fn(Identifier) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let metrics = HarvestMetrics::start(self.label.clone());
        let ids = match self.resolve(page_fetch).await {
            Ok(ids) => ids,
            Err(e) => {
                metrics.record_failure(&e.to_string());
                return Err(e);
            }
        };
        metrics.record_resolved(ids.len());
        Ok(record_outcome(self.stream(ids, detail_fetch), metrics))
    }

    /// Resolve and fetch everything, collecting the records.
    ///
    /// # Errors
    /// Returns the first error; records fetched before it are discarded.
    pub async fn harvest_all<T, P, PFut, D, DFut>(&self, page_fetch: P, detail_fetch: D) -> FetchResult<Vec<T>>
    where
        T: Send + 'static,
        P: FnMut(u32, u32) -> PFut,
        PFut: Future<Output = FetchResult<Page>>,
        D: Fn(Identifier) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let metrics = HarvestMetrics::start(self.label.clone());
        let ids = match self.resolve(page_fetch).await {
            Ok(ids) => ids,
            Err(e) => {
                metrics.record_failure(&e.to_string());
                return Err(e);
            }
        };
        metrics.record_resolved(ids.len());

        let mut records = Vec::with_capacity(ids.len());
        let mut stream = self.stream(ids, detail_fetch);
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => records.push(record),
                Err(e) => {
                    metrics.record_failure(&e.to_string());
                    return Err(e);
                }
            }
        }
        metrics.record_success(records.len());
        Ok(records)
    }
}

/// Report the end of `records` to `metrics`, exactly once.
fn record_outcome<T: Send + 'static>(records: RecordStream<T>, metrics: HarvestMetrics) -> RecordStream<T> {
    Box::pin(stream::unfold(
        (records, Some(metrics), 0usize),
        |(mut records, mut metrics, fetched)| async move {
            match records.next().await {
                Some(Ok(record)) => Some((Ok(record), (records, metrics, fetched + 1))),
                Some(Err(e)) => {
                    if let Some(metrics) = metrics.take() {
                        metrics.record_failure(&e.to_string());
                    }
                    Some((Err(e), (records, metrics, fetched)))
                }
                None => {
                    if let Some(metrics) = metrics.take() {
                        metrics.record_success(fetched);
                    }
                    None
                }
            }
        },
    ))
}
