// Tiered value cache for individual (protocol, attribute, date) fee values.
//
// Tiers form an ordered fallback chain, fastest first, with the last tier as
// the source of truth. Reads walk the chain and backfill every faster tier
// that missed; writes go to all tiers concurrently and succeed iff the
// source-of-truth write succeeds. Additional tiers can be added without
// changing call sites.

use crate::database::DurableStore;
use crate::metrics;
use crate::redis_store::FastStore;
use crate::settings::Stores;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the cache key shared by all key/value tiers for one
/// (protocol, attribute, date) triple.
pub fn cache_key(protocol: &str, attribute: &str, date: &str) -> String {
    format!("{}-{}-{}", protocol, attribute, date)
}

/// One backend in the fallback chain.
///
/// Implementations absorb their own transport failures: `get` answers `None`
/// for absent, invalid and unreachable alike, and only the source-of-truth
/// tier is allowed to fail a `set`.
#[async_trait]
pub trait ValueTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, protocol: &str, attribute: &str, date: &str) -> Option<f64>;

    async fn set(&self, protocol: &str, attribute: &str, date: &str, value: f64) -> Result<()>;
}

pub struct ValueCache {
    tiers: Vec<Arc<dyn ValueTier>>,
}

impl ValueCache {
    /// Tiers ordered fastest first; the last tier is the source of truth.
    pub fn new(tiers: Vec<Arc<dyn ValueTier>>) -> Self {
        Self { tiers }
    }

    /// The standard two-tier chain: Redis in front of Postgres.
    pub fn with_default_tiers(stores: &Stores) -> Self {
        Self::new(vec![
            Arc::new(FastStore::new(stores.redis_url.clone())),
            Arc::new(DurableStore::new(stores.database_url.clone())),
        ])
    }

    /// Read-through lookup. Absent can mean "never computed" or "computed as
    /// genuinely unavailable"; the caller decides which.
    pub async fn get(&self, protocol: &str, attribute: &str, date: &str) -> Option<f64> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            if let Some(value) = tier.get(protocol, attribute, date).await {
                metrics::increment_cache_hit(tier.name());
                // Backfill the faster tiers that missed
                for faster in &self.tiers[..idx] {
                    let _ = faster.set(protocol, attribute, date, value).await;
                }
                return Some(value);
            }
        }
        metrics::increment_cache_miss();
        None
    }

    /// Write-through set. A fast-tier failure only degrades future read
    /// latency; the write logically succeeds iff the source of truth took it.
    pub async fn set(&self, protocol: &str, attribute: &str, date: &str, value: f64) -> Result<()> {
        let writes = self
            .tiers
            .iter()
            .map(|tier| tier.set(protocol, attribute, date, value));
        let mut results = futures::future::join_all(writes).await;
        match results.pop() {
            Some(source_of_truth) => source_of_truth,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MemoryTier {
        name: &'static str,
        values: Mutex<HashMap<String, f64>>,
        fail_writes: bool,
    }

    impl MemoryTier {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                values: Mutex::new(HashMap::new()),
                fail_writes: false,
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail_writes: true,
                ..Self::new(name)
            }
        }

        async fn contains(&self, protocol: &str, attribute: &str, date: &str) -> bool {
            self.values
                .lock()
                .await
                .contains_key(&cache_key(protocol, attribute, date))
        }
    }

    #[async_trait]
    impl ValueTier for MemoryTier {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn get(&self, protocol: &str, attribute: &str, date: &str) -> Option<f64> {
            self.values
                .lock()
                .await
                .get(&cache_key(protocol, attribute, date))
                .copied()
        }

        async fn set(&self, protocol: &str, attribute: &str, date: &str, value: f64) -> Result<()> {
            if self.fail_writes {
                anyhow::bail!("write refused");
            }
            self.values
                .lock()
                .await
                .insert(cache_key(protocol, attribute, date), value);
            Ok(())
        }
    }

    #[test]
    fn key_is_deterministic_concatenation() {
        assert_eq!(cache_key("uniswap", "fee", "2025-01-15"), "uniswap-fee-2025-01-15");
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = ValueCache::new(vec![
            Arc::new(MemoryTier::new("fast")),
            Arc::new(MemoryTier::new("durable")),
        ]);
        cache.set("uniswap", "fee", "2025-01-15", 1234.5).await.unwrap();
        assert_eq!(cache.get("uniswap", "fee", "2025-01-15").await, Some(1234.5));
    }

    #[tokio::test]
    async fn durable_hit_backfills_fast_tier() {
        let fast = Arc::new(MemoryTier::new("fast"));
        let durable = Arc::new(MemoryTier::new("durable"));
        durable.set("aave", "fee", "2025-01-10", 42.0).await.unwrap();

        let cache = ValueCache::new(vec![fast.clone(), durable.clone()]);
        assert_eq!(cache.get("aave", "fee", "2025-01-10").await, Some(42.0));
        assert!(fast.contains("aave", "fee", "2025-01-10").await);
    }

    #[tokio::test]
    async fn fast_write_failure_is_non_fatal() {
        let fast = Arc::new(MemoryTier::failing("fast"));
        let durable = Arc::new(MemoryTier::new("durable"));
        let cache = ValueCache::new(vec![fast, durable.clone()]);

        cache.set("aave", "fee", "2025-01-10", 7.0).await.unwrap();
        assert!(durable.contains("aave", "fee", "2025-01-10").await);
    }

    #[tokio::test]
    async fn durable_write_failure_fails_the_set() {
        let cache = ValueCache::new(vec![
            Arc::new(MemoryTier::new("fast")),
            Arc::new(MemoryTier::failing("durable")),
        ]);
        assert!(cache.set("aave", "fee", "2025-01-10", 7.0).await.is_err());
    }

    #[tokio::test]
    async fn disabled_tiers_read_absent_and_ack_writes() {
        // Both tiers without configuration degrade to permanent no-ops.
        let cache = ValueCache::with_default_tiers(&Stores::default());
        assert_eq!(cache.get("uniswap", "fee", "2025-01-15").await, None);
        assert!(cache.set("uniswap", "fee", "2025-01-15", 1.0).await.is_ok());
    }

    #[tokio::test]
    async fn round_trips_with_fast_tier_disabled() {
        // Durable-only path: the disabled fast tier reads absent and the
        // durable tier still answers
        let cache = ValueCache::new(vec![
            Arc::new(FastStore::new(None)),
            Arc::new(MemoryTier::new("durable")),
        ]);
        cache.set("lido", "fee", "2025-03-01", 11.5).await.unwrap();
        assert_eq!(cache.get("lido", "fee", "2025-03-01").await, Some(11.5));
    }

    #[tokio::test]
    async fn fast_only_chain_round_trips() {
        let cache = ValueCache::new(vec![Arc::new(MemoryTier::new("fast"))]);
        cache.set("gmx", "fee", "2025-02-01", 9.0).await.unwrap();
        assert_eq!(cache.get("gmx", "fee", "2025-02-01").await, Some(9.0));
    }
}
