// DefiLlama aggregate fees client and process-wide snapshot cache.

use crate::errors::FeeError;
use crate::metrics;
use crate::protocols::AggregateSnapshot;
use crate::settings::Upstream;
use anyhow::Result;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Seam for the upstream aggregate source, so the caching and stale-serving
/// logic can be exercised without a network.
#[async_trait]
pub trait FeeSource: Send + Sync {
    async fn fetch(&self) -> Result<AggregateSnapshot>;
}

/// HTTP client for the DefiLlama aggregate fees endpoint.
pub struct DefiLlamaClient {
    client: reqwest::Client,
    fees_url: String,
}

impl DefiLlamaClient {
    pub fn new(upstream: &Upstream) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(upstream.request_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            fees_url: upstream.fees_url.clone(),
        }
    }
}

#[async_trait]
impl FeeSource for DefiLlamaClient {
    async fn fetch(&self) -> Result<AggregateSnapshot> {
        let response = match self.client.get(&self.fees_url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow::anyhow!("HTTP request failed: {}", e));
            }
        };

        if !response.status().is_success() {
            if response.status() == 429 {
                return Err(anyhow::anyhow!("Rate limited (429)"));
            }
            return Err(anyhow::anyhow!("HTTP error: {}", response.status()));
        }

        let snapshot: AggregateSnapshot = match response.json().await {
            Ok(s) => s,
            Err(e) => {
                return Err(anyhow::anyhow!("JSON parse failed: {}", e));
            }
        };

        Ok(snapshot)
    }
}

struct CachedSnapshot {
    snapshot: Arc<AggregateSnapshot>,
    fetched_at: Instant,
}

/// Process-wide snapshot cache with TTL and stale-on-error fallback.
///
/// The cached snapshot is replaced wholesale, never mutated in place, so
/// concurrent readers observe either the old snapshot or the new one.
/// Refresh attempts are coalesced: a burst of callers hitting an expired
/// window performs a single upstream call.
pub struct SnapshotCache {
    source: Arc<dyn FeeSource>,
    ttl: Duration,
    current: Arc<ArcSwapOption<CachedSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn FeeSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: Arc::new(ArcSwapOption::empty()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(upstream: &Upstream) -> Self {
        Self::new(
            Arc::new(DefiLlamaClient::new(upstream)),
            Duration::from_secs(upstream.cache_ttl_seconds),
        )
    }

    /// Returns the cached snapshot while it is fresh, refreshes it when the
    /// TTL has expired, and serves the previous snapshot (however old) when a
    /// refresh fails. Fails only when no snapshot has ever been obtained.
    pub async fn fetch_snapshot(&self) -> Result<Arc<AggregateSnapshot>, FeeError> {
        if let Some(entry) = self.current.load_full() {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Serving upstream snapshot from cache");
                return Ok(entry.snapshot.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(entry) = self.current.load_full() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.snapshot.clone());
            }
        }

        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if let Some(entry) = self.current.load_full() {
                    let age = entry.fetched_at.elapsed();
                    warn!(
                        "⚠️ Upstream refresh failed, serving stale snapshot (age {:?}): {}",
                        age, e
                    );
                    metrics::increment_upstream_fetch("stale_served");
                    metrics::record_snapshot_age(age.as_secs_f64());
                    Ok(entry.snapshot.clone())
                } else {
                    metrics::increment_upstream_fetch("failed");
                    Err(FeeError::UpstreamUnavailable(e.to_string()))
                }
            }
        }
    }

    /// Runs one upstream fetch on a detached task. A caller that gives up
    /// (outer request timeout) does not cancel the call, so the cache can
    /// still be updated by a fetch whose caller is gone.
    async fn refresh(&self) -> Result<Arc<AggregateSnapshot>> {
        let source = self.source.clone();
        let current = self.current.clone();

        let handle: tokio::task::JoinHandle<Result<Arc<AggregateSnapshot>>> =
            tokio::spawn(async move {
                let snapshot = Arc::new(source.fetch().await?);
                info!(
                    "✅ Upstream snapshot refreshed ({} protocols)",
                    snapshot.protocols.len()
                );
                metrics::increment_upstream_fetch("success");
                metrics::record_snapshot_age(0.0);
                current.store(Some(Arc::new(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    fetched_at: Instant::now(),
                })));
                Ok(snapshot)
            });

        handle
            .await
            .map_err(|e| anyhow::anyhow!("refresh task failed: {}", e))?
    }

    /// Age of the currently cached snapshot, if any.
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.current
            .load()
            .as_ref()
            .map(|entry| entry.fetched_at.elapsed())
    }
}
