//! Integration tests for logging and tracing

use collection_fetcher::fetcher::{stream_records, FetchError};
use collection_fetcher::harvest::ProgressReporter;
use collection_fetcher::{CancellationToken, FetchProgress};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_test_subscriber() {
    // try_init fails harmlessly when another test installed a subscriber first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("collection_fetcher=trace"))
        .with_test_writer()
        .try_init();
}

#[test]
fn test_env_filter_parsing() {
    assert!(EnvFilter::try_new("collection_fetcher=debug").is_ok());
    assert!(EnvFilter::try_new("info,collection_fetcher::fetcher=trace").is_ok());
}

#[test]
fn test_json_subscriber_builds() {
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("collection_fetcher=info"))
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(completed = 1, total = 2, "json formatted event");
    });
}

#[tokio::test]
async fn test_stream_emits_under_trace_subscriber() {
    init_test_subscriber();

    let records: Vec<_> = stream_records(
        vec![1, 2, 3],
        2,
        |id| async move { Ok::<_, FetchError>(id) },
        None,
        CancellationToken::none(),
    )
    .collect()
    .await;

    assert_eq!(records.len(), 3);
}

#[test]
fn test_progress_reporter_logs_on_completion() {
    init_test_subscriber();

    let reporter = Arc::new(ProgressReporter::new("objects", 2).with_cadence(Duration::from_secs(3600), 100.0));
    let hook = reporter.clone().into_hook();
    hook(FetchProgress { completed: 1, total: 2 });
    hook(FetchProgress { completed: 2, total: 2 });

    let state = reporter.snapshot().unwrap();
    assert_eq!(state.completed, 2);
    assert_eq!(state.last_reported_percentage, 100.0);
}
