// Fee service: ties the upstream snapshot, normalization and the bundling/
// filtering engine together per request. Holds the process-wide shared
// pieces (snapshot cache, bundle registry, tiered value cache); each request
// observes a single atomic snapshot and is idempotent given that snapshot.

use crate::defillama::SnapshotCache;
use crate::errors::FeeError;
use crate::filters::{self, FilterSpec};
use crate::normalize;
use crate::protocols::{BundleRegistry, ProtocolListing, ProtocolMetric};
use crate::settings::Settings;
use crate::value_cache::ValueCache;
use anyhow::Result;
use std::sync::Arc;

pub struct FeeService {
    snapshots: Arc<SnapshotCache>,
    bundles: BundleRegistry,
    value_cache: Arc<ValueCache>,
}

impl FeeService {
    pub fn new(settings: &Settings) -> Self {
        Self::with_components(
            Arc::new(SnapshotCache::from_settings(&settings.upstream)),
            Arc::new(ValueCache::with_default_tiers(&settings.stores)),
        )
    }

    pub fn with_components(snapshots: Arc<SnapshotCache>, value_cache: Arc<ValueCache>) -> Self {
        Self {
            snapshots,
            bundles: BundleRegistry::new(),
            value_cache,
        }
    }

    /// Full normalized metric set, descending by daily fees.
    pub async fn protocol_fees(&self) -> Result<Vec<ProtocolMetric>, FeeError> {
        let snapshot = self.snapshots.fetch_snapshot().await?;
        Ok(normalize::normalize(&snapshot.protocols, &self.bundles))
    }

    /// Normalized metrics with filters applied and bundles collapsed.
    /// Returns the records plus one human-readable tag per active filter
    /// dimension.
    pub async fn filtered_protocol_fees(
        &self,
        spec: &FilterSpec,
    ) -> Result<(Vec<ProtocolMetric>, Vec<String>), FeeError> {
        let records = self.protocol_fees().await?;
        let (records, tags) = filters::apply_filters(records, spec);
        Ok((filters::bundle(records, &self.bundles), tags))
    }

    /// Single protocol looked up by slug, module or case-insensitive name.
    /// `None` when unknown, or when the protocol has no positive daily total.
    pub async fn protocol_by_id(&self, id: &str) -> Result<Option<ProtocolMetric>, FeeError> {
        let snapshot = self.snapshots.fetch_snapshot().await?;
        let lowered = id.to_lowercase();

        let Some(record) = snapshot
            .protocols
            .iter()
            .find(|p| p.slug == id || p.module == id || p.name.to_lowercase() == lowered)
        else {
            return Ok(None);
        };

        Ok(
            normalize::normalize(std::slice::from_ref(record), &self.bundles)
                .into_iter()
                .next(),
        )
    }

    /// Lightweight listing of the published protocols (raw upstream category
    /// labels, no derived metrics).
    pub async fn protocol_listing(&self) -> Result<Vec<ProtocolListing>, FeeError> {
        let snapshot = self.snapshots.fetch_snapshot().await?;
        Ok(snapshot
            .protocols
            .iter()
            .filter(|p| p.total_24h.map_or(false, |total| total > 0.0))
            .map(|p| ProtocolListing {
                id: if !p.slug.is_empty() {
                    p.slug.clone()
                } else {
                    p.module.clone()
                },
                name: if !p.display_name.is_empty() {
                    p.display_name.clone()
                } else {
                    p.name.clone()
                },
                category: p.category.clone(),
                logo: p.logo.clone(),
                chains: p.chains.clone(),
                slug: p.slug.clone(),
            })
            .collect())
    }

    /// Historical value lookup for one (protocol, attribute, date) triple,
    /// served from the tiered cache. Absent means never computed or computed
    /// as genuinely unavailable.
    pub async fn historical_value(
        &self,
        protocol: &str,
        attribute: &str,
        date: &str,
    ) -> Option<f64> {
        self.value_cache.get(protocol, attribute, date).await
    }

    /// Persists one historical value through both cache tiers.
    pub async fn store_historical_value(
        &self,
        protocol: &str,
        attribute: &str,
        date: &str,
        value: f64,
    ) -> Result<()> {
        self.value_cache.set(protocol, attribute, date, value).await
    }

    pub fn bundles(&self) -> &BundleRegistry {
        &self.bundles
    }

    pub fn value_cache(&self) -> &ValueCache {
        &self.value_cache
    }

    pub fn snapshot_cache(&self) -> &SnapshotCache {
        &self.snapshots
    }
}
