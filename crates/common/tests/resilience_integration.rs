//! Integration tests for the resilience module
//!
//! Exercises the limiter and breaker registry under concurrent callers.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use storesync_common::resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, InMemoryWindowStore, MockClock,
    ResilienceError, SlidingWindowLimiter,
};

#[derive(Debug)]
struct Unreachable;

impl std::fmt::Display for Unreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream unreachable")
    }
}

impl std::error::Error for Unreachable {}

/// Concurrent callers on one key never get more than `limit` admissions
/// inside a single window.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_exceed_limit() {
    let clock = MockClock::new();
    let store = Arc::new(InMemoryWindowStore::new());
    let limiter = SlidingWindowLimiter::with_clock(store, clock.clone());

    let tasks = (0..64).map(|_| {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.check("rl:sync:store-1", 10, Duration::from_secs(1)).await })
    });
    let decisions: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    let allowed = decisions.iter().filter(|d| d.allowed).count();
    assert_eq!(allowed, 10);

    let mut remaining: Vec<u32> =
        decisions.iter().filter(|d| d.allowed).map(|d| d.remaining).collect();
    remaining.sort_unstable();
    assert_eq!(remaining, (0..10).collect::<Vec<_>>());
}

/// A window that has fully rolled over admits a fresh batch.
#[tokio::test]
async fn window_rolls_over() {
    let clock = MockClock::new();
    let limiter =
        SlidingWindowLimiter::with_clock(Arc::new(InMemoryWindowStore::new()), clock.clone());

    for _ in 0..3 {
        assert!(limiter.check("rl:test:ip1", 3, Duration::from_secs(1)).await.allowed);
    }
    assert!(!limiter.check("rl:test:ip1", 3, Duration::from_secs(1)).await.allowed);

    clock.advance(Duration::from_millis(1_001));
    let decision = limiter.check("rl:test:ip1", 3, Duration::from_secs(1)).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 2);
}

/// Full breaker lifecycle through the registry with a shared mock clock.
#[tokio::test]
async fn breaker_lifecycle_through_registry() {
    let clock = MockClock::new();
    let registry =
        CircuitBreakerRegistry::with_clock(CircuitBreakerConfig::default(), clock.clone()).unwrap();
    let invocations = Arc::new(AtomicU32::new(0));

    for _ in 0..5 {
        let counter = Arc::clone(&invocations);
        let result = registry
            .guard("woo:store-7", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Unreachable)
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
    }
    assert_eq!(registry.state("woo:store-7"), CircuitState::Open);

    let counter = Arc::clone(&invocations);
    let rejected = registry
        .guard("woo:store-7", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Unreachable>(())
        })
        .await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 5);

    clock.advance(Duration::from_secs(30));
    for _ in 0..2 {
        registry.guard("woo:store-7", || async { Ok::<_, Unreachable>(()) }).await.unwrap();
    }
    assert_eq!(registry.state("woo:store-7"), CircuitState::Closed);
}

/// Concurrent failures from many tasks open the breaker exactly once and
/// leave other keys untouched.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_open_only_their_key() {
    let registry = Arc::new(
        CircuitBreakerRegistry::with_clock(CircuitBreakerConfig::default(), MockClock::new())
            .unwrap(),
    );

    let tasks = (0..20).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let _ = registry.guard("tenant-a", || async { Err::<(), _>(Unreachable) }).await;
        })
    });
    join_all(tasks).await;

    assert_eq!(registry.state("tenant-a"), CircuitState::Open);
    assert_eq!(registry.state("tenant-b"), CircuitState::Closed);
    assert_eq!(registry.open_keys(), vec!["tenant-a".to_string()]);
}
