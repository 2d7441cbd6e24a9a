//! Unit tests for cache behaviour under concurrent access

use collection_fetcher::{CachePolicy, FetchResult, KeyedLruCache, ValueCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_respect_capacity() {
    let cache = Arc::new(KeyedLruCache::<u64, u64>::try_with_capacity(8).unwrap());

    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50u64 {
                cache.put(worker * 1000 + i, i).await;
                assert!(cache.len().await <= 8);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len().await, 8);
}

#[tokio::test]
async fn test_departments_cached_once() {
    let departments: ValueCache<Vec<String>> = ValueCache::new();
    let calls = AtomicUsize::new(0);
    let fetch = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        FetchResult::Ok(vec!["Asian Art".to_string(), "Arms and Armor".to_string()])
    };

    let first = departments.get(CachePolicy::UseCache, fetch).await.unwrap();
    let second = departments.get(CachePolicy::UseCache, fetch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_eviction_order_follows_access() {
    let cache = KeyedLruCache::<&'static str, u32>::try_with_capacity(3).unwrap();
    cache.put("a", 1).await;
    cache.put("b", 2).await;
    cache.put("c", 3).await;

    cache.get("a").await;
    cache.get("b").await;

    assert_eq!(cache.put("d", 4).await, Some(("c", 3)));
    assert_eq!(cache.put("e", 5).await, Some(("a", 1)));
}
