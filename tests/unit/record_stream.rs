//! Unit tests for the windowed record stream

use collection_fetcher::fetcher::{stream_records, FetchError};
use collection_fetcher::CancellationToken;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks how many fetches run at once
#[derive(Clone, Default)]
struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_never_exceeds_concurrency() {
    for concurrency in [1, 3, 8] {
        let gauge = Gauge::default();
        let probe = gauge.clone();

        let records: Vec<_> = stream_records(
            (0..40).collect(),
            concurrency,
            move |id| {
                let probe = probe.clone();
                async move {
                    probe.enter();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    probe.exit();
                    Ok::<_, FetchError>(id)
                }
            },
            None,
            CancellationToken::none(),
        )
        .collect()
        .await;

        assert_eq!(records.len(), 40);
        assert!(gauge.peak.load(Ordering::SeqCst) <= concurrency);
    }
}

#[tokio::test]
async fn test_every_identifier_yielded_once() {
    let mut records: Vec<u64> = stream_records(
        (1..=25).collect(),
        4,
        |id| async move { Ok::<_, FetchError>(id) },
        None,
        CancellationToken::none(),
    )
    .map(|r| r.unwrap())
    .collect()
    .await;

    records.sort_unstable();
    assert_eq!(records, (1..=25).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_consumer_controls_pace() {
    let started = Arc::new(AtomicUsize::new(0));
    let counter = started.clone();

    let mut stream = stream_records(
        (0..20).collect(),
        5,
        move |id| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, FetchError>(id) }
        },
        None,
        CancellationToken::none(),
    );

    stream.next().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Only the first window runs until the consumer asks for more.
    assert_eq!(started.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_first_error_ends_stream() {
    let items: Vec<_> = stream_records(
        vec![1, 2, 3],
        1,
        |id| async move {
            if id == 2 {
                Err(FetchError::TransientServer { status: 500 })
            } else {
                Ok(id)
            }
        },
        None,
        CancellationToken::none(),
    )
    .collect()
    .await;

    assert_eq!(items.len(), 2);
    assert_eq!(*items[0].as_ref().unwrap(), 1);
    assert!(items[1].is_err());
}
