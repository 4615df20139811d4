// Filtering and bundling over normalized protocol metrics.
//
// Filtering is conjunctive across dimensions and disjunctive within one: a
// record passes when it matches any requested category AND any requested
// chain. An empty dimension is a no-op for that dimension. Each active
// dimension contributes one human-readable tag, categories before chains.

use crate::protocols::{BundleRegistry, Category, ProtocolMetric};
use indexmap::IndexMap;
use serde::Deserialize;

/// Requested filter dimensions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub chains: Vec<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.chains.is_empty()
    }
}

/// Display labels for the canonical categories.
pub const CATEGORY_LABELS: &[(Category, &str)] = &[
    (Category::L1, "Layer 1"),
    (Category::L2, "Layer 2"),
    (Category::Dex, "DEX"),
    (Category::Lending, "Lending"),
    (Category::Xchain, "Cross-chain"),
    (Category::Other, "Other"),
];

/// Display labels for the chains exposed as filters; anything else falls back
/// to its raw identifier.
pub const CHAIN_LABELS: &[(&str, &str)] = &[
    ("ethereum", "Ethereum"),
    ("bsc", "BSC"),
    ("polygon", "Polygon"),
    ("avalanche", "Avalanche"),
    ("arbitrum", "Arbitrum"),
    ("optimism", "Optimism"),
    ("solana", "Solana"),
];

fn category_label(category: Category) -> &'static str {
    CATEGORY_LABELS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, label)| *label)
        .unwrap_or("Other")
}

fn chain_label(chain: &str) -> String {
    CHAIN_LABELS
        .iter()
        .find(|(raw, _)| *raw == chain)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| chain.to_string())
}

/// Keeps records matching any of the requested categories. An empty request
/// keeps everything and produces no tag.
pub fn filter_categories(
    records: Vec<ProtocolMetric>,
    categories: &[Category],
) -> (Vec<ProtocolMetric>, Option<String>) {
    if categories.is_empty() {
        return (records, None);
    }

    let filtered = records
        .into_iter()
        .filter(|record| categories.contains(&record.category))
        .collect();

    let labels: Vec<&str> = categories.iter().map(|c| category_label(*c)).collect();
    (filtered, Some(format!("Category: {}", labels.join(", "))))
}

/// Keeps records whose blockchain matches any of the requested chains.
/// Records without a blockchain never match a chain filter.
pub fn filter_chains(
    records: Vec<ProtocolMetric>,
    chains: &[String],
) -> (Vec<ProtocolMetric>, Option<String>) {
    if chains.is_empty() {
        return (records, None);
    }

    let filtered = records
        .into_iter()
        .filter(|record| {
            record
                .blockchain
                .as_ref()
                .map_or(false, |blockchain| chains.iter().any(|c| c == blockchain))
        })
        .collect();

    let labels: Vec<String> = chains.iter().map(|c| chain_label(c)).collect();
    (filtered, Some(format!("Chain: {}", labels.join(", "))))
}

/// Applies every filter dimension in order and collects the tags of the
/// active ones.
pub fn apply_filters(
    records: Vec<ProtocolMetric>,
    spec: &FilterSpec,
) -> (Vec<ProtocolMetric>, Vec<String>) {
    let mut tags = Vec::new();

    let (records, tag) = filter_categories(records, &spec.categories);
    if let Some(tag) = tag {
        tags.push(tag);
    }

    let (records, tag) = filter_chains(records, &spec.chains);
    if let Some(tag) = tag {
        tags.push(tag);
    }

    (records, tags)
}

/// Groups records by declared bundle id and collapses each group with known
/// metadata into one aggregated record whose scalars are the sum over the
/// members. A group without metadata passes through unbundled (deliberate
/// safety fallback, not an error). Output: bundled records first, in
/// first-seen bundle-id order, then unbundled records in original order.
pub fn bundle(records: Vec<ProtocolMetric>, bundles: &BundleRegistry) -> Vec<ProtocolMetric> {
    let mut grouped: IndexMap<String, Vec<ProtocolMetric>> = IndexMap::new();
    let mut unbundled = Vec::new();

    for record in records {
        match record.bundle.clone() {
            Some(bundle_id) => grouped.entry(bundle_id).or_default().push(record),
            None => unbundled.push(record),
        }
    }

    let mut out = Vec::with_capacity(grouped.len() + unbundled.len());

    for (bundle_id, members) in grouped {
        let Some(metadata) = bundles.get(&bundle_id) else {
            out.extend(members);
            continue;
        };

        let one_day = members.iter().map(|m| m.one_day).sum();
        let seven_day_average = members.iter().map(|m| m.seven_day_average).sum();

        out.push(ProtocolMetric {
            id: bundle_id,
            name: metadata.name,
            short_name: None,
            category: metadata.category,
            bundle: None,
            description: None,
            fee_description: None,
            icon: None,
            website: None,
            blockchain: None,
            source: None,
            adapter: metadata.adapter,
            protocol_launch: metadata.protocol_launch,
            one_day,
            seven_day_average,
            fees: Vec::new(),
            bundle_data: Some(members),
            price: None,
            market_cap: None,
            fdv: None,
            ps_ratio: None,
            ps_ratio_fdv: None,
        });
    }

    out.extend(unbundled);
    out
}
