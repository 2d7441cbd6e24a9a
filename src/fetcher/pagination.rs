//! Identifier resolution across paginated search results
//!
//! Collection search endpoints answer with a total hit count plus one page of
//! object identifiers. The resolver keeps requesting pages until it has as many
//! identifiers as the first response promised, or until a page comes back empty,
//! whichever happens first. Servers whose reported total drifts between pages
//! therefore still terminate.
//!
//! Retrying belongs to the transport behind `page_fetch`; errors returned by it
//! are propagated unchanged.

use std::future::Future;
use tracing::debug;

use super::{FetchError, FetchResult};
use crate::cancellation::CancellationToken;
use crate::Identifier;

/// Maximum number of pages requested before giving up
pub const MAX_PAGES: usize = 10_000;

/// One page of search results: the reported total and the identifiers on the page
pub type Page = (usize, Vec<Identifier>);

/// Identifier resolver for paginated search endpoints
pub struct IdentifierResolver;

impl IdentifierResolver {
    /// Collect every identifier starting from page 1.
    ///
    /// # Arguments
    /// * `page_fetch` - Fetches `(page, page_size)` and returns `(total, ids)`
    /// * `page_size` - Identifiers requested per page (0 is treated as 1)
    /// * `cancellation` - Checked before every page request
    ///
    /// # Errors
    /// Propagates `page_fetch` errors, [`FetchError::Cancelled`], or
    /// [`FetchError::PaginationLimit`] after [`MAX_PAGES`] pages.
    pub async fn resolve_all<F, Fut>(
        page_fetch: F,
        page_size: u32,
        cancellation: &CancellationToken,
    ) -> FetchResult<Vec<Identifier>>
    where
        F: FnMut(u32, u32) -> Fut,
        Fut: Future<Output = FetchResult<Page>>,
    {
        Self::resolve_from(1, page_fetch, page_size, cancellation).await
    }

    /// Collect every identifier starting from `start_page`.
    pub async fn resolve_from<F, Fut>(
        start_page: u32,
        mut page_fetch: F,
        page_size: u32,
        cancellation: &CancellationToken,
    ) -> FetchResult<Vec<Identifier>>
    where
        F: FnMut(u32, u32) -> Fut,
        Fut: Future<Output = FetchResult<Page>>,
    {
        let page_size = page_size.max(1);
        let mut all_ids: Vec<Identifier> = Vec::new();
        let mut expected_total: Option<usize> = None;
        let mut page = start_page;
        let mut iteration = 0;

        loop {
            if iteration >= MAX_PAGES {
                return Err(FetchError::PaginationLimit(MAX_PAGES));
            }

            if cancellation.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            debug!(page, page_size, collected = all_ids.len(), "Fetching identifier page");
            let (total, ids) = page_fetch(page, page_size).await?;

            // Only the first response's total is trusted.
            let target = *expected_total.get_or_insert(total);
            if target == 0 {
                debug!("Search reported no results");
                break;
            }

            if ids.is_empty() {
                debug!(
                    page,
                    collected = all_ids.len(),
                    expected = target,
                    "Empty page received, stopping"
                );
                break;
            }

            debug!(page, received = ids.len(), "Received identifier page");
            all_ids.extend(ids);

            if all_ids.len() >= target {
                break;
            }

            page = page.saturating_add(1);
            iteration += 1;
        }

        debug!(
            pages = iteration + 1,
            identifiers = all_ids.len(),
            "Identifier resolution complete"
        );
        Ok(all_ids)
    }
}
