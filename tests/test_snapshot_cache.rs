//! Integration tests for the upstream snapshot cache
//!
//! Tests cover:
//! - TTL window (no network access while fresh)
//! - Stale-on-error fallback
//! - Cold failure propagation
//! - Single-flight refresh coalescing
//!
//! All tests run against a mock fee source, no network required.

use async_trait::async_trait;
use fee_metrics_sdk::defillama::{FeeSource, SnapshotCache};
use fee_metrics_sdk::errors::FeeError;
use fee_metrics_sdk::protocols::{AggregateSnapshot, RawProtocol};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct MockSource {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Duration,
}

impl MockSource {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    fn failing() -> Self {
        let source = Self::new();
        source.failing.store(true, Ordering::SeqCst);
        source
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn start_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeeSource for MockSource {
    async fn fetch(&self) -> anyhow::Result<AggregateSnapshot> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("HTTP error: 503 Service Unavailable");
        }
        Ok(AggregateSnapshot {
            protocols: vec![RawProtocol {
                name: "uniswap".to_string(),
                slug: "uniswap".to_string(),
                category: "Dexs".to_string(),
                // Stamp the call number so tests can tell snapshots apart
                total_24h: Some(call as f64),
                ..RawProtocol::default()
            }],
            ..AggregateSnapshot::default()
        })
    }
}

#[tokio::test]
async fn fresh_snapshot_is_served_without_network_access() {
    let source = Arc::new(MockSource::new());
    let cache = SnapshotCache::new(source.clone(), Duration::from_secs(300));

    let first = cache.fetch_snapshot().await.unwrap();
    let second = cache.fetch_snapshot().await.unwrap();

    assert_eq!(source.call_count(), 1);
    assert_eq!(
        first.protocols[0].total_24h,
        second.protocols[0].total_24h
    );
}

#[tokio::test]
async fn expired_window_triggers_a_refresh() {
    let source = Arc::new(MockSource::new());
    let cache = SnapshotCache::new(source.clone(), Duration::ZERO);

    let first = cache.fetch_snapshot().await.unwrap();
    let second = cache.fetch_snapshot().await.unwrap();

    assert_eq!(source.call_count(), 2);
    assert_eq!(first.protocols[0].total_24h, Some(1.0));
    assert_eq!(second.protocols[0].total_24h, Some(2.0));
}

#[tokio::test]
async fn stale_snapshot_is_served_when_refresh_fails() {
    let source = Arc::new(MockSource::new());
    let cache = SnapshotCache::new(source.clone(), Duration::ZERO);

    let fresh = cache.fetch_snapshot().await.unwrap();
    source.start_failing();

    // The window has expired and the refresh fails: the previous snapshot
    // comes back, not an error
    let stale = cache.fetch_snapshot().await.unwrap();
    assert_eq!(source.call_count(), 2);
    assert_eq!(fresh.protocols[0].total_24h, stale.protocols[0].total_24h);

    // And it keeps being served on every subsequent failing refresh
    let stale_again = cache.fetch_snapshot().await.unwrap();
    assert_eq!(fresh.protocols[0].total_24h, stale_again.protocols[0].total_24h);
}

#[tokio::test]
async fn cold_failure_surfaces_upstream_unavailable() {
    let source = Arc::new(MockSource::failing());
    let cache = SnapshotCache::new(source, Duration::from_secs(300));

    match cache.fetch_snapshot().await {
        Err(FeeError::UpstreamUnavailable(message)) => {
            assert!(message.contains("503"));
        }
        other => panic!("expected UpstreamUnavailable, got {:?}", other.map(|_| ())),
    }
    assert!(cache.snapshot_age().is_none());
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let source = Arc::new(MockSource::slow(Duration::from_millis(100)));
    let cache = Arc::new(SnapshotCache::new(source.clone(), Duration::from_secs(300)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.fetch_snapshot().await }));
    }

    for handle in handles {
        let snapshot = handle.await.unwrap().unwrap();
        // Everyone observes the single fetched snapshot, never a partial one
        assert_eq!(snapshot.protocols[0].total_24h, Some(1.0));
    }
    assert_eq!(source.call_count(), 1);
}
