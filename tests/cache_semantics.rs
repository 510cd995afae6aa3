//! Cache-layer contracts: idempotence, LRU pressure, dependency
//! invalidation, memory bounds, and coordinator-wide purges.

use std::sync::Arc;
use std::time::Duration;

use parsemill::cache::{CachePolicy, CacheCoordinator, CacheValue, UnifiedCache};

fn cache(budget: usize) -> UnifiedCache {
    UnifiedCache::new(
        "test",
        CachePolicy {
            budget_bytes: budget,
            default_ttl: Duration::from_secs(3_600),
            adaptive_ttl: false,
        },
    )
}

fn payload(size: usize) -> Arc<dyn CacheValue> {
    Arc::new(vec![0u8; size])
}

/// get(set(k, v)); get(k) = v until invalidation; consecutive gets agree.
#[test]
fn cache_idempotence() {
    let cache = cache(1 << 20);
    cache.set("k", payload(64), None, &[]).unwrap();

    let first = cache.get("k").expect("first get");
    let second = cache.get("k").expect("second get");
    assert_eq!(first.size_bytes(), second.size_bytes());

    cache.invalidate("k");
    assert!(cache.get("k").is_none());
}

/// Budget 1024; A, B, C of 500 each; touch A; insert D: B is evicted as
/// the LRU and residents are {A, C, D} within budget + largest entry.
#[test]
fn eviction_under_pressure() {
    let cache = cache(1024);
    cache.set("A", payload(500), None, &[]).unwrap();
    cache.set("B", payload(500), None, &[]).unwrap();
    cache.set("C", payload(500), None, &[]).unwrap();

    assert!(cache.get("A").is_some());
    cache.set("D", payload(500), None, &[]).unwrap();

    assert!(cache.contains("A"), "A was touched, must survive");
    assert!(!cache.contains("B"), "B was LRU, must be evicted");
    assert!(cache.contains("C"));
    assert!(cache.contains("D"));
    assert!(cache.bytes_resident() <= 1024 + 500);
}

/// E1 depends on D, E2 depends on E1: invalidating D misses them all.
#[test]
fn transitive_invalidation() {
    let cache = cache(1 << 20);
    cache.set("D", payload(8), None, &[]).unwrap();
    cache
        .set("E1", payload(8), None, &["D".to_string()])
        .unwrap();
    cache
        .set("E2", payload(8), None, &["E1".to_string()])
        .unwrap();

    cache.invalidate("D");

    assert!(cache.get("D").is_none());
    assert!(cache.get("E1").is_none());
    assert!(cache.get("E2").is_none());

    // Re-insertion works after invalidation.
    cache.set("E1", payload(8), None, &[]).unwrap();
    assert!(cache.get("E1").is_some());
}

/// An entry alone bigger than the budget is rejected as a miss signal.
#[test]
fn oversize_rejection() {
    let cache = cache(256);
    assert!(cache.set("big", payload(257), None, &[]).is_err());
    assert!(cache.get("big").is_none());
    assert_eq!(cache.bytes_resident(), 0);
}

/// Resident bytes never exceed budget + largest accepted entry, across a
/// randomized-ish workload.
#[test]
fn memory_bound_holds_under_churn() {
    let cache = cache(4_096);
    let mut largest = 0;
    for i in 0..200 {
        let size = 64 + (i * 37) % 1_024;
        largest = largest.max(size);
        cache
            .set(&format!("k{i}"), payload(size), None, &[])
            .unwrap();
        assert!(
            cache.bytes_resident() <= 4_096 + largest,
            "bound violated at iteration {i}"
        );
    }
}

/// The coordinator purges by prefix across every registered cache; the
/// file-watcher hook in hosts relies on this.
#[test]
fn coordinator_prefix_purge() {
    let coordinator = CacheCoordinator::new();
    let ast = Arc::new(UnifiedCache::new("ast", CachePolicy::default()));
    let pattern = Arc::new(UnifiedCache::new("pattern", CachePolicy::default()));
    coordinator.register(Arc::clone(&ast));
    coordinator.register(Arc::clone(&pattern));

    ast.set("ast:python:aaaa", payload(8), None, &[]).unwrap();
    pattern
        .set("python.function:aaaa", payload(8), None, &[])
        .unwrap();
    pattern
        .set("rust.function:bbbb", payload(8), None, &[])
        .unwrap();

    coordinator.invalidate_prefix("ast:python");
    assert!(ast.get("ast:python:aaaa").is_none());
    assert!(pattern.get("rust.function:bbbb").is_some());

    coordinator.invalidate_all();
    assert!(pattern.get("python.function:aaaa").is_none());
    assert!(pattern.get("rust.function:bbbb").is_none());
}

/// Expired entries behave exactly like invalidated ones.
#[test]
fn ttl_expiry_is_a_miss() {
    let cache = UnifiedCache::new(
        "ttl",
        CachePolicy {
            budget_bytes: 1 << 20,
            default_ttl: Duration::from_millis(10),
            adaptive_ttl: false,
        },
    );
    cache.set("k", payload(8), None, &[]).unwrap();
    assert!(cache.get("k").is_some());

    std::thread::sleep(Duration::from_millis(30));
    assert!(cache.get("k").is_none());
    let metrics = cache.metrics();
    assert!(metrics.misses >= 1);
}

/// Concurrent readers and writers keep the cache coherent.
#[test]
fn concurrent_access_is_serializable() {
    let cache = Arc::new(UnifiedCache::new("conc", CachePolicy::default()));
    let mut handles = Vec::new();

    for t in 0..4 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in 0..100 {
                let key = format!("t{t}-k{i}");
                cache
                    .set(&key, Arc::new(vec![0u8; 32]) as Arc<dyn CacheValue>, None, &[])
                    .unwrap();
                assert!(cache.get(&key).is_some());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 400);
}
