// src/normalize.rs
//
// Transformation of raw upstream records into the canonical protocol metric
// model: category normalization, scalar derivation, synthetic trailing-week
// series, zero-value filtering and descending-volume ordering.

use crate::protocols::{
    BundleMetadata, BundleRegistry, Category, DailyFee, ProtocolMetric, RawProtocol, SourceLink,
};
use chrono::{Duration, NaiveDate, Utc};

/// Adapter tag stamped on every metric produced by this pipeline.
pub const ADAPTER_TAG: &str = "defillama";

/// Ordered exact-match table from free-form upstream category labels to the
/// canonical category set. Many labels map onto one category; anything not
/// listed falls back to `Other`. Kept as data, not matching logic.
pub const CATEGORY_TABLE: &[(&str, Category)] = &[
    ("Dexs", Category::Dex),
    ("Dexes", Category::Dex),
    ("Lending", Category::Lending),
    ("Bridge", Category::Xchain),
    ("Chain", Category::L1),
    ("Liquid Staking", Category::Other),
    ("Derivatives", Category::Dex),
    ("CDP", Category::Lending),
    ("Yield Aggregator", Category::Other),
    ("Yield", Category::Other),
    ("Options", Category::Dex),
    ("Prediction", Category::Other),
    ("NFT", Category::Other),
    ("Gaming", Category::Other),
    ("RWA", Category::Other),
    ("L2", Category::L2),
    ("Rollup", Category::L2),
];

pub fn map_category(label: &str) -> Category {
    CATEGORY_TABLE
        .iter()
        .find(|(raw, _)| *raw == label)
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}

const SHORT_NAME_MAX_CHARS: usize = 15;
const SHORT_NAME_TRUNCATED_CHARS: usize = 12;

fn short_name(name: &str) -> Option<String> {
    if name.chars().count() > SHORT_NAME_MAX_CHARS {
        let truncated: String = name.chars().take(SHORT_NAME_TRUNCATED_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        None
    }
}

/// Synthesizes the trailing-week daily series from aggregate windows only.
///
/// The upstream source exposes 24h/7d totals, not a per-day breakdown: the
/// final point (today) is the 24h total verbatim, every earlier point is the
/// weekly mean. Approximate by construction; downstream consumers must not
/// present it as ground-truth history.
pub fn synthesize_weekly_series(one_day: f64, total_7d: f64, today: NaiveDate) -> Vec<DailyFee> {
    let daily_avg = total_7d / 7.0;

    (0..7)
        .rev()
        .map(|days_back| DailyFee {
            date: today - Duration::days(days_back),
            value: if days_back == 0 { one_day } else { daily_avg },
        })
        .collect()
}

/// Normalizes a raw snapshot into the published metric set, ordered by
/// descending daily fees, using today's date for the synthetic series.
pub fn normalize(records: &[RawProtocol], bundles: &BundleRegistry) -> Vec<ProtocolMetric> {
    normalize_at(records, bundles, Utc::now().date_naive())
}

/// Same as [`normalize`] with an explicit reference date, which keeps the
/// transformation a pure function of its inputs.
pub fn normalize_at(
    records: &[RawProtocol],
    bundles: &BundleRegistry,
    today: NaiveDate,
) -> Vec<ProtocolMetric> {
    let mut metrics: Vec<ProtocolMetric> = records
        .iter()
        // Records without a positive 24h total are not "zero-fee protocols",
        // they are excluded from the published surface entirely.
        .filter(|p| p.total_24h.map_or(false, |total| total > 0.0))
        .map(|p| normalize_record(p, bundles, today))
        .collect();

    // Descending by daily fees; ties keep their input order (stable sort)
    metrics.sort_by(|a, b| {
        b.one_day
            .partial_cmp(&a.one_day)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    metrics
}

fn normalize_record(p: &RawProtocol, bundles: &BundleRegistry, today: NaiveDate) -> ProtocolMetric {
    let one_day = p.total_24h.unwrap_or(0.0);
    // Negative aggregates are upstream glitches, treated as absent
    let total_7d = p.total_7d.filter(|total| *total >= 0.0);
    // Absent weekly data means "assume today is representative", not zero
    let seven_day_average = total_7d.map(|total| total / 7.0).unwrap_or(one_day);

    let id = if !p.slug.is_empty() {
        p.slug.clone()
    } else {
        p.module.clone()
    };
    let name = if !p.display_name.is_empty() {
        p.display_name.clone()
    } else {
        p.name.clone()
    };
    let category = map_category(&p.category);

    let fee_description = p
        .methodology
        .as_ref()
        .and_then(|methodology| methodology.get("Fees"))
        .cloned();
    let description = fee_description
        .clone()
        .unwrap_or_else(|| format!("{} protocol fees", p.name));
    let website = p
        .methodology_url
        .as_ref()
        .map(|_| format!("https://defillama.com/protocol/{}", p.slug));

    if let Some(bundle_id) = &p.parent_protocol {
        bundles.record(
            bundle_id,
            BundleMetadata {
                name: name.clone(),
                category,
                adapter: ADAPTER_TAG.to_string(),
                protocol_launch: None,
            },
        );
    }

    ProtocolMetric {
        id,
        short_name: short_name(&p.name),
        name,
        category,
        bundle: p.parent_protocol.clone(),
        description: Some(description),
        fee_description,
        icon: p.logo.clone(),
        website,
        blockchain: p.chains.first().cloned(),
        source: Some(SourceLink {
            name: "DefiLlama".to_string(),
            url: format!("https://defillama.com/fees/{}", p.slug),
        }),
        adapter: ADAPTER_TAG.to_string(),
        protocol_launch: None,
        one_day,
        seven_day_average,
        fees: synthesize_weekly_series(one_day, total_7d.unwrap_or(one_day * 7.0), today),
        bundle_data: None,
        price: None,
        market_cap: None,
        fdv: None,
        ps_ratio: None,
        ps_ratio_fdv: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn raw(slug: &str, total_24h: Option<f64>, total_7d: Option<f64>) -> RawProtocol {
        RawProtocol {
            name: slug.to_string(),
            slug: slug.to_string(),
            category: "Dexs".to_string(),
            chains: vec!["ethereum".to_string()],
            total_24h,
            total_7d,
            ..RawProtocol::default()
        }
    }

    #[test]
    fn maps_known_labels_and_defaults_to_other() {
        assert_eq!(map_category("Dexs"), Category::Dex);
        assert_eq!(map_category("Dexes"), Category::Dex);
        assert_eq!(map_category("Derivatives"), Category::Dex);
        assert_eq!(map_category("CDP"), Category::Lending);
        assert_eq!(map_category("Bridge"), Category::Xchain);
        assert_eq!(map_category("Chain"), Category::L1);
        assert_eq!(map_category("Rollup"), Category::L2);
        assert_eq!(map_category("Liquid Staking"), Category::Other);
        // Exact string match only, no pattern inference
        assert_eq!(map_category("dexs"), Category::Other);
        assert_eq!(map_category("Something New"), Category::Other);
    }

    #[test]
    fn drops_records_without_positive_daily_total() {
        let records = vec![
            raw("kept", Some(100.0), Some(700.0)),
            raw("zero", Some(0.0), Some(700.0)),
            raw("negative", Some(-5.0), Some(700.0)),
            raw("absent", None, Some(700.0)),
        ];
        let out = normalize_at(&records, &BundleRegistry::new(), today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "kept");
    }

    #[test]
    fn derives_scalars_from_aggregate_windows() {
        let out = normalize_at(
            &[raw("x", Some(1000.0), Some(4900.0))],
            &BundleRegistry::new(),
            today(),
        );
        assert_eq!(out[0].one_day, 1000.0);
        assert_eq!(out[0].seven_day_average, 700.0);
        assert_eq!(out[0].category, Category::Dex);
        assert_eq!(out[0].blockchain.as_deref(), Some("ethereum"));
    }

    #[test]
    fn absent_weekly_total_falls_back_to_daily() {
        let out = normalize_at(&[raw("x", Some(1000.0), None)], &BundleRegistry::new(), today());
        assert_eq!(out[0].seven_day_average, 1000.0);
        // Every earlier synthetic point assumes today is representative
        for point in &out[0].fees[..6] {
            assert_eq!(point.value, 1000.0);
        }
    }

    #[test]
    fn series_covers_trailing_week_ending_today() {
        let out = normalize_at(
            &[raw("x", Some(1000.0), Some(4900.0))],
            &BundleRegistry::new(),
            today(),
        );
        let fees = &out[0].fees;
        assert_eq!(fees.len(), 7);
        assert_eq!(fees[6].date, today());
        assert_eq!(fees[6].value, 1000.0);
        for (offset, point) in fees[..6].iter().enumerate() {
            assert_eq!(point.date, today() - Duration::days(6 - offset as i64));
            assert_eq!(point.value, 700.0);
        }
    }

    #[test]
    fn orders_descending_by_daily_total() {
        let records = vec![
            raw("small", Some(10.0), None),
            raw("big", Some(1000.0), None),
            raw("mid", Some(100.0), None),
        ];
        let out = normalize_at(&records, &BundleRegistry::new(), today());
        let ids: Vec<&str> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["big", "mid", "small"]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let records = vec![
            raw("a", Some(500.0), Some(2100.0)),
            raw("b", Some(900.0), None),
        ];
        let bundles = BundleRegistry::new();
        let first = normalize_at(&records, &bundles, today());
        let second = normalize_at(&records, &bundles, today());
        assert_eq!(first, second);
    }

    #[test]
    fn long_names_get_a_truncated_short_form() {
        let mut record = raw("long", Some(10.0), None);
        record.name = "An Extremely Long Protocol Name".to_string();
        let out = normalize_at(&[record], &BundleRegistry::new(), today());
        assert_eq!(out[0].short_name.as_deref(), Some("An Extremely..."));

        let out = normalize_at(&[raw("short", Some(10.0), None)], &BundleRegistry::new(), today());
        assert_eq!(out[0].short_name, None);
    }

    #[test]
    fn records_bundle_metadata_for_declared_parents() {
        let mut member = raw("uniswap-v3", Some(100.0), None);
        member.display_name = "Uniswap V3".to_string();
        member.parent_protocol = Some("parent#uniswap".to_string());

        let bundles = BundleRegistry::new();
        let out = normalize_at(&[member], &bundles, today());

        assert_eq!(out[0].bundle.as_deref(), Some("parent#uniswap"));
        let metadata = bundles.get("parent#uniswap").unwrap();
        assert_eq!(metadata.name, "Uniswap V3");
        assert_eq!(metadata.category, Category::Dex);
        assert_eq!(metadata.adapter, ADAPTER_TAG);
    }

    #[test]
    fn market_fields_stay_unpopulated() {
        let out = normalize_at(&[raw("x", Some(10.0), None)], &BundleRegistry::new(), today());
        assert_eq!(out[0].price, None);
        assert_eq!(out[0].market_cap, None);
        assert_eq!(out[0].fdv, None);
        assert_eq!(out[0].ps_ratio, None);
        assert_eq!(out[0].ps_ratio_fdv, None);
    }
}
