// Core domain model: raw upstream records, the canonical protocol metric
// shape, and bundle metadata.

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Canonical protocol categories published by the pipeline.
///
/// Free-form upstream category labels map onto this fixed set through the
/// table in [`crate::normalize::CATEGORY_TABLE`]; anything unmapped lands in
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    L1,
    L2,
    Dex,
    Lending,
    Xchain,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::L1 => "l1",
            Category::L2 => "l2",
            Category::Dex => "dex",
            Category::Lending => "lending",
            Category::Xchain => "xchain",
            Category::Other => "other",
        }
    }

    /// Parses the canonical lowercase identifier (filter query values).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "l1" => Some(Category::L1),
            "l2" => Some(Category::L2),
            "dex" => Some(Category::Dex),
            "lending" => Some(Category::Lending),
            "xchain" => Some(Category::Xchain),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

/// One protocol record as returned by the upstream aggregator.
///
/// Untrusted shape: every aggregate total may be absent, the category label
/// is free-form, and the chain list may be empty. Records are only read
/// during transformation, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawProtocol {
    #[serde(rename = "defillamaId")]
    pub defillama_id: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub module: String,
    pub category: String,
    pub logo: Option<String>,
    pub chains: Vec<String>,
    pub slug: String,
    #[serde(rename = "total24h")]
    pub total_24h: Option<f64>,
    #[serde(rename = "total7d")]
    pub total_7d: Option<f64>,
    #[serde(rename = "total30d")]
    pub total_30d: Option<f64>,
    pub methodology: Option<HashMap<String, String>>,
    #[serde(rename = "methodologyURL")]
    pub methodology_url: Option<String>,
    #[serde(rename = "parentProtocol")]
    pub parent_protocol: Option<String>,
}

/// One complete result of querying the upstream aggregate source.
///
/// Replaced wholesale in the snapshot cache, never mutated in place, so
/// concurrent readers always observe a single atomic snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregateSnapshot {
    pub protocols: Vec<RawProtocol>,
    #[serde(rename = "total24h")]
    pub total_24h: f64,
    #[serde(rename = "total7d")]
    pub total_7d: f64,
    #[serde(rename = "total30d")]
    pub total_30d: f64,
    #[serde(rename = "allChains")]
    pub all_chains: Vec<String>,
}

/// One point of the synthetic trailing-week series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyFee {
    pub date: NaiveDate,
    pub value: f64,
}

/// Attribution link back to the upstream data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLink {
    pub name: String,
    pub url: String,
}

/// Normalized, internal canonical form of a protocol's fee metrics.
///
/// The market fields (`price`, `market_cap`, ...) are placeholders owned by a
/// different subsystem; this pipeline never populates them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetric {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLink>,
    pub adapter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_launch: Option<NaiveDate>,
    pub one_day: f64,
    pub seven_day_average: f64,
    /// Approximate daily fees for the trailing week (see `normalize` docs);
    /// empty on aggregated bundle records.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fees: Vec<DailyFee>,
    /// Member records of an aggregated bundle, kept for drill-down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_data: Option<Vec<ProtocolMetric>>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
    pub ps_ratio: Option<f64>,
    #[serde(rename = "psRatioFDV")]
    pub ps_ratio_fdv: Option<f64>,
}

/// Lightweight listing row for the protocols endpoint. Carries the raw
/// upstream category label, not the normalized one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolListing {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub chains: Vec<String>,
    pub slug: String,
}

/// Display metadata for a bundle of protocols.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleMetadata {
    pub name: String,
    pub category: Category,
    pub adapter: String,
    pub protocol_launch: Option<NaiveDate>,
}

/// Process-wide registry of bundle metadata, populated as a side effect of
/// normalizing records that declare a bundle id. Last write wins when members
/// disagree; bundle metadata is expected to be consistent across members.
#[derive(Debug, Clone, Default)]
pub struct BundleRegistry {
    inner: Arc<DashMap<String, BundleMetadata>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str, metadata: BundleMetadata) {
        self.inner.insert(id.to_string(), metadata);
    }

    pub fn get(&self, id: &str) -> Option<BundleMetadata> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
