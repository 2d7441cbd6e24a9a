//! Integration tests for cooperative cancellation across transport and stream

use collection_fetcher::fetcher::{stream_records, FetchError, RetryingTransport};
use collection_fetcher::harvest::config::{RetryPolicy, TransportConfig};
use collection_fetcher::CancellationSource;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_cancel_interrupts_backoff_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/objects/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = CancellationSource::new();
    let config = TransportConfig::default().with_retry(RetryPolicy::new(3, Duration::from_secs(60), 2.0));
    let transport = RetryingTransport::with_client(reqwest::Client::new(), config).with_cancellation(source.token());

    let canceller = source.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = transport
        .get_json::<serde_json::Value>(&format!("{}/objects/1", server.uri()), &[])
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_after_first_record_stops_stream() {
    let source = CancellationSource::new();
    let fetched = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = fetched.clone();

    let mut stream = stream_records(
        vec![10, 11, 12],
        1,
        move |id| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(id);
                Ok::<_, FetchError>(id)
            }
        },
        None,
        source.token(),
    );

    assert_eq!(stream.next().await.unwrap().unwrap(), 10);
    source.cancel();

    let next = stream.next().await.unwrap();
    assert!(matches!(next, Err(FetchError::Cancelled)));
    assert!(stream.next().await.is_none());
    assert!(!fetched.lock().unwrap().contains(&12));
}

#[tokio::test]
async fn test_cancel_bounds_fetches_to_current_window() {
    let source = CancellationSource::new();
    let started = Arc::new(AtomicUsize::new(0));
    let counter = started.clone();
    let concurrency = 4;

    let mut stream = stream_records(
        (0..100).collect(),
        concurrency,
        move |id| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, FetchError>(id)
            }
        },
        None,
        source.token(),
    );

    stream.next().await.unwrap().unwrap();
    let before_cancel = started.load(Ordering::SeqCst);
    source.cancel();

    while let Some(item) = stream.next().await {
        if item.is_err() {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(started.load(Ordering::SeqCst) <= before_cancel + concurrency);
}
