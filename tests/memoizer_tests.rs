use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use cyphervector::{CacheConfig, CacheKey, GraphMapError, Memoizer, TypeTag};

const MINUTE: Duration = Duration::from_secs(60);

struct Subject;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_computation() {
    let memo = Arc::new(Memoizer::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("slow");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let memo = Arc::clone(&memo);
        let calls = Arc::clone(&calls);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            memo.get_or_compute_async(&key, MINUTE, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, GraphMapError>(vec![1u32, 2, 3])
            })
            .await
        }));
    }
    for handle in handles {
        let value = handle.await.expect("task panicked").expect("computation");
        assert_eq!(value, vec![1, 2, 3]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = memo.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 15);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_threads_blocking_on_one_key_share_one_computation() {
    const THREADS: usize = 8;
    let memo = Arc::new(Memoizer::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(THREADS));
    let key = CacheKey::new("slow_sync");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let memo = Arc::clone(&memo);
            let calls = Arc::clone(&calls);
            let start = Arc::clone(&start);
            let key = key.clone();
            thread::spawn(move || {
                start.wait();
                memo.get_or_compute(&key, MINUTE, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok::<_, GraphMapError>(String::from("unpacked"))
                })
            })
        })
        .collect();
    for handle in handles {
        let value = handle.join().expect("thread panicked").expect("computation");
        assert_eq!(value, "unpacked");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = memo.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, THREADS as u64 - 1);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let memo = Memoizer::default();
    let key = CacheKey::new("ttl");
    let ttl = Duration::from_secs(10);

    let first = memo
        .get_or_compute_async(&key, ttl, || async { Ok::<_, GraphMapError>(1u32) })
        .await
        .expect("first");
    tokio::time::advance(Duration::from_secs(9)).await;
    let cached = memo
        .get_or_compute_async(&key, ttl, || async { Ok::<_, GraphMapError>(2u32) })
        .await
        .expect("cached");
    tokio::time::advance(Duration::from_secs(2)).await;
    let refreshed = memo
        .get_or_compute_async(&key, ttl, || async { Ok::<_, GraphMapError>(3u32) })
        .await
        .expect("refreshed");

    assert_eq!((first, cached, refreshed), (1, 1, 3));
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_counts_removed_entries() {
    let memo = Memoizer::default();
    for (name, secs) in [("short", 1), ("long", 100)] {
        let key = CacheKey::new(name);
        memo.get_or_compute_async(&key, Duration::from_secs(secs), || async {
            Ok::<_, GraphMapError>(String::from(name))
        })
        .await
        .expect("populate");
    }
    tokio::time::advance(Duration::from_secs(5)).await;

    assert_eq!(memo.purge_expired(), 1);
    assert_eq!(memo.stats().entries, 1);
}

#[tokio::test]
async fn test_empty_values_are_recomputed() {
    let memo = Memoizer::default();
    let key = CacheKey::new("none");
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let value = memo
            .get_or_compute_async(&key, MINUTE, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Option<u32>, GraphMapError>(None)
            })
            .await
            .expect("compute");
        assert_eq!(value, None);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(memo.stats().entries, 0);
}

#[tokio::test]
async fn test_errors_are_returned_and_not_stored() {
    let memo = Memoizer::default();
    let key = CacheKey::new("flaky");

    let err = memo
        .get_or_compute_async(&key, MINUTE, || async {
            Err::<u32, _>(GraphMapError::session("down"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GraphMapError::Session(_)));
    assert_eq!(memo.stats().entries, 0);

    let value = memo
        .get_or_compute_async(&key, MINUTE, || async { Ok::<_, GraphMapError>(5u32) })
        .await
        .expect("retry");
    assert_eq!(value, 5);
}

#[tokio::test]
async fn test_invalidate_forces_recompute() {
    let memo = Memoizer::default();
    let key = CacheKey::new("answer");

    memo.get_or_compute_async(&key, MINUTE, || async { Ok::<_, GraphMapError>(1u32) })
        .await
        .expect("populate");
    memo.invalidate(&key);
    let value = memo
        .get_or_compute_async(&key, MINUTE, || async { Ok::<_, GraphMapError>(2u32) })
        .await
        .expect("recompute");

    assert_eq!(value, 2);
}

#[test]
fn test_invalidate_subject_drops_every_param_variant() {
    let memo = Memoizer::default();
    let by_name = CacheKey::for_type::<Subject>("scan")
        .with_params(&Some("name"))
        .expect("params");
    let unordered = CacheKey::for_type::<Subject>("scan")
        .with_params(&None::<&str>)
        .expect("params");
    let other_op = CacheKey::for_type::<Subject>("other");

    for key in [&by_name, &unordered, &other_op] {
        let _: Result<u32, GraphMapError> = memo.get_or_compute(key, MINUTE, || Ok(1));
    }
    assert_eq!(memo.stats().entries, 3);

    memo.invalidate_subject("scan", TypeTag::of::<Subject>());
    assert_eq!(memo.stats().entries, 1);

    let recomputed: Result<u32, GraphMapError> = memo.get_or_compute(&by_name, MINUTE, || Ok(9));
    assert_eq!(recomputed.expect("recompute"), 9);
}

#[test]
fn test_sweep_drops_expired_on_insert() {
    let config = CacheConfig {
        sweep_threshold: 2,
        ..CacheConfig::default()
    };
    let memo = Memoizer::new(&config);
    for name in ["a", "b"] {
        let _: Result<u32, GraphMapError> =
            memo.get_or_compute(&CacheKey::new(name), Duration::ZERO, || Ok(1));
    }
    let _: Result<u32, GraphMapError> =
        memo.get_or_compute(&CacheKey::new("c"), MINUTE, || Ok(1));

    assert_eq!(memo.stats().entries, 1);
}

#[test]
fn test_clear_resets_stats() {
    let memo = Memoizer::default();
    let key = CacheKey::new("x");
    for _ in 0..2 {
        let _: Result<u32, GraphMapError> = memo.get_or_compute(&key, MINUTE, || Ok(1));
    }
    memo.clear();
    assert_eq!(memo.stats(), Default::default());
}
