//! Windowed record streaming with a fixed concurrency ceiling
//!
//! Identifiers are split into consecutive windows of `concurrency` ids. Every
//! fetch of a window runs as its own task; the next window starts only after the
//! current one has been fully yielded. Records within a window arrive in
//! completion order, windows arrive in order.
//!
//! The stream is pull-based. Dropping it aborts whatever is still running in the
//! current window.

use futures_util::stream;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

use super::{FetchError, FetchResult, RecordStream};
use crate::cancellation::CancellationToken;
use crate::metrics::record_record_fetched;
use crate::{FetchProgress, Identifier};

/// Callback notified once per successfully fetched record
pub type ProgressHook = Arc<dyn Fn(FetchProgress) + Send + Sync>;

struct WindowState<T, F> {
    ids: Vec<Identifier>,
    next_index: usize,
    concurrency: usize,
    in_flight: JoinSet<FetchResult<T>>,
    completed: usize,
    detail_fetch: Arc<F>,
    progress: Option<ProgressHook>,
    cancellation: CancellationToken,
    finished: bool,
}

impl<T, F, Fut> WindowState<T, F>
where
    T: Send + 'static,
    F: Fn(Identifier) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
{
    /// Spawn the next window. Returns false when every id has been scheduled.
    fn start_window(&mut self) -> bool {
        if self.next_index >= self.ids.len() {
            return false;
        }
        let end = (self.next_index + self.concurrency).min(self.ids.len());
        debug!(
            window_start = self.next_index,
            window_len = end - self.next_index,
            total = self.ids.len(),
            "Starting fetch window"
        );

        for &id in &self.ids[self.next_index..end] {
            let fetch = self.detail_fetch.clone();
            let token = self.cancellation.clone();
            self.in_flight.spawn(async move {
                if token.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                fetch(id).await
            });
        }
        self.next_index = end;
        true
    }

    fn finish(&mut self) {
        self.in_flight.abort_all();
        self.finished = true;
    }

    async fn next_record(&mut self) -> Option<FetchResult<T>> {
        if self.finished {
            return None;
        }

        if self.in_flight.is_empty() {
            if self.cancellation.is_cancelled() {
                self.finish();
                return Some(Err(FetchError::Cancelled));
            }
            if !self.start_window() {
                self.finished = true;
                return None;
            }
        }

        let joined = self.in_flight.join_next().await?;
        let outcome = joined.unwrap_or_else(|e| Err(FetchError::TaskFailed(e.to_string())));

        match outcome {
            Ok(record) => {
                if self.cancellation.is_cancelled() {
                    debug!(completed = self.completed, "Cancellation requested, abandoning window");
                    self.finish();
                    return Some(Err(FetchError::Cancelled));
                }
                self.completed += 1;
                record_record_fetched();
                if let Some(progress) = &self.progress {
                    progress(FetchProgress {
                        completed: self.completed,
                        total: self.ids.len(),
                    });
                }
                Some(Ok(record))
            }
            Err(e) => {
                debug!(completed = self.completed, error = %e, "Fetch failed, ending stream");
                self.finish();
                Some(Err(e))
            }
        }
    }
}

/// Stream the records for `ids`, at most `concurrency` fetches at a time.
///
/// # Arguments
/// * `ids` - Identifiers to fetch, in window order
/// * `concurrency` - Window size; 0 is treated as 1
/// * `detail_fetch` - Fetches one record
/// * `progress` - Notified after each successful record
/// * `cancellation` - Checked before each window, before each fetch and before
///   each yield
///
/// The stream ends after the last record, or with the first error. A
/// [`FetchError::Cancelled`] item is yielded when the token fires.
pub fn stream_records<T, F, Fut>(
    ids: Vec<Identifier>,
    concurrency: usize,
    detail_fetch: F,
    progress: Option<ProgressHook>,
    cancellation: CancellationToken,
) -> RecordStream<T>
where
    T: Send + 'static,
    F: Fn(Identifier) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
{
    let state = WindowState {
        ids,
        next_index: 0,
        concurrency: concurrency.max(1),
        in_flight: JoinSet::new(),
        completed: 0,
        detail_fetch: Arc::new(detail_fetch),
        progress,
        cancellation,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_record().await?;
        Some((item, state))
    }))
}
