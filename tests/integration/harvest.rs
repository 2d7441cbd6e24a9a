//! End-to-end harvest against a mock collection API

use collection_fetcher::fetcher::FetchError;
use collection_fetcher::harvest::config::{HarvestConfig, RetryPolicy, TransportConfig};
use collection_fetcher::{CachePolicy, CollectionHarvester, FetchProgress, KeyedLruCache};
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct SearchPage {
    total: usize,
    ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Artwork {
    id: u64,
    title: String,
}

async fn mock_collection(ids: &[u64], page_size: usize) -> MockServer {
    let server = MockServer::start().await;

    for (index, chunk) in ids.chunks(page_size).enumerate() {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("page", (index + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": ids.len(),
                "ids": chunk,
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": ids.len(),
            "ids": [],
        })))
        .mount(&server)
        .await;

    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/objects/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "title": format!("Object {id}"),
            })))
            .mount(&server)
            .await;
    }

    server
}

fn fast_config(page_size: u32, concurrency: usize) -> HarvestConfig {
    HarvestConfig::default()
        .with_page_size(page_size)
        .with_concurrency(concurrency)
        .with_transport(TransportConfig::default().with_retry(RetryPolicy::new(1, Duration::ZERO, 2.0)))
}

#[tokio::test]
async fn test_harvest_fetches_every_object() {
    let ids: Vec<u64> = (1..=7).collect();
    let server = mock_collection(&ids, 3).await;
    let base = server.uri();

    let harvester = CollectionHarvester::new(fast_config(3, 2)).with_label("artworks");
    let search = harvester.transport();
    let detail = search.clone();
    let search_url = format!("{base}/search");
    let detail_base = base.clone();

    let mut artworks: Vec<Artwork> = harvester
        .harvest_all(
            |page, size| {
                let transport = search.clone();
                let url = search_url.clone();
                async move {
                    let body: SearchPage = transport
                        .get_json(&url, &[("page", page.to_string()), ("pageSize", size.to_string())])
                        .await?;
                    Ok::<_, FetchError>((body.total, body.ids))
                }
            },
            move |id| {
                let transport = detail.clone();
                let url = format!("{detail_base}/objects/{id}");
                async move { transport.get_json::<Artwork>(&url, &[]).await }
            },
        )
        .await
        .unwrap();

    artworks.sort_by_key(|a| a.id);
    assert_eq!(artworks.len(), 7);
    assert_eq!(artworks[0].title, "Object 1");
    assert_eq!(artworks[6].title, "Object 7");
}

#[tokio::test]
async fn test_harvest_progress_reaches_total() {
    let ids: Vec<u64> = (100..105).collect();
    let server = mock_collection(&ids, 10).await;
    let base = server.uri();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let harvester = CollectionHarvester::new(fast_config(10, 3))
        .with_progress(Arc::new(move |p: FetchProgress| sink.lock().unwrap().push(p)));
    let transport = harvester.transport();
    let detail = transport.clone();
    let search_url = format!("{base}/search");

    let artworks: Vec<Artwork> = harvester
        .harvest_all(
            |page, _| {
                let transport = transport.clone();
                let url = search_url.clone();
                async move {
                    let body: SearchPage = transport.get_json(&url, &[("page", page.to_string())]).await?;
                    Ok::<_, FetchError>((body.total, body.ids))
                }
            },
            move |id| {
                let transport = detail.clone();
                let url = format!("{base}/objects/{id}");
                async move { transport.get_json::<Artwork>(&url, &[]).await }
            },
        )
        .await
        .unwrap();

    assert_eq!(artworks.len(), 5);
    let events = events.lock().unwrap();
    let completed: Vec<usize> = events.iter().map(|p| p.completed).collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5]);
    assert!(events.iter().all(|p| p.total == 5));
    assert!(events.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_cached_details_skip_network() {
    let ids: Vec<u64> = (1..=4).collect();
    let server = mock_collection(&ids, 10).await;
    let base = server.uri();

    let cache: Arc<KeyedLruCache<u64, Artwork>> = Arc::new(KeyedLruCache::try_with_capacity(16).unwrap());
    let harvester = CollectionHarvester::new(fast_config(10, 2));
    let transport = harvester.transport();

    let detail_fetch = {
        let cache = cache.clone();
        let transport = transport.clone();
        let base = base.clone();
        move |id: u64| {
            let cache = cache.clone();
            let transport = transport.clone();
            let url = format!("{base}/objects/{id}");
            async move {
                cache
                    .get_or_fetch(id, CachePolicy::UseCache, || async {
                        transport.get_json::<Artwork>(&url, &[]).await
                    })
                    .await
            }
        }
    };

    for _ in 0..2 {
        let records: Vec<Artwork> = harvester
            .stream(ids.clone(), detail_fetch.clone())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(records.len(), 4);
    }

    let detail_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/objects/"))
        .count();
    assert_eq!(detail_requests, 4);
    assert_eq!(cache.len().await, 4);
}
