//! Unit tests for identifier resolution against misbehaving search endpoints

use collection_fetcher::fetcher::pagination::{IdentifierResolver, Page, MAX_PAGES};
use collection_fetcher::fetcher::FetchError;
use collection_fetcher::{CancellationSource, CancellationToken, FetchResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_overreported_total_stops_on_empty_page() {
    // Reports 10 results but only ever serves 4.
    let ids = IdentifierResolver::resolve_all(
        |page, _| async move {
            let ids = match page {
                1 => vec![1, 2],
                2 => vec![3, 4],
                _ => vec![],
            };
            Ok::<Page, FetchError>((10, ids))
        },
        2,
        &CancellationToken::none(),
    )
    .await
    .unwrap();

    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_underreported_total_keeps_first_page() {
    // Page is larger than the reported total; everything received is kept.
    let ids = IdentifierResolver::resolve_all(
        |_, _| async { Ok::<Page, FetchError>((3, vec![5, 6, 7, 8, 9])) },
        100,
        &CancellationToken::none(),
    )
    .await
    .unwrap();

    assert_eq!(ids, vec![5, 6, 7, 8, 9]);
}

#[tokio::test]
async fn test_growing_total_is_ignored() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let ids = IdentifierResolver::resolve_all(
        move |page, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            let total = if page == 1 { 2 } else { 500 };
            async move { Ok::<Page, FetchError>((total, vec![page as u64])) }
        },
        1,
        &CancellationToken::none(),
    )
    .await
    .unwrap();

    assert_eq!(ids, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_runaway_pagination_hits_limit() {
    let err = IdentifierResolver::resolve_all(
        |_, _| async { Ok::<Page, FetchError>((usize::MAX, vec![1])) },
        1,
        &CancellationToken::none(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, FetchError::PaginationLimit(limit) if limit == MAX_PAGES));
}

#[tokio::test]
async fn test_cancel_between_pages() {
    let source = CancellationSource::new();
    let canceller = source.clone();

    let result: FetchResult<Vec<u64>> = IdentifierResolver::resolve_all(
        move |page, _| {
            if page == 2 {
                canceller.cancel();
            }
            async move { Ok::<Page, FetchError>((10, vec![page as u64])) }
        },
        1,
        &source.token(),
    )
    .await;

    assert!(result.unwrap_err().is_cancelled());
}
