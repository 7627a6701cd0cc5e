//! Network-free mapping from upstream report JSON to the shapes the site renders.
//!
//! Field provenance:
//!
//! | Output                      | Source                                                   |
//! |-----------------------------|----------------------------------------------------------|
//! | `AppStats.downloads`        | `/reports/sales` → `<id>.downloads`                      |
//! | `AppStats.impressions`      | `/reports/usage` → `apple:analytics.<id>.impressions`     |
//! | `AppStats.app_store_views`  | `/reports/usage` → `apple:analytics.<id>.app_store_views` |
//! | `Rating.stars`              | `/ratings` → `<id>.stars`                                |
//! | `Rating.count`              | `/ratings` → `<id>.total_rating_count`                   |
//! | `CatalogEntry.product`      | aggregator → `<id>.product`, or `<id>` itself            |
//! | `CatalogEntry.stats`        | aggregator → `<id>.sales`, overridden by `<id>.usage`    |
//! | `CatalogEntry.rating`       | aggregator → `<id>.ratings`                              |
//!
//! Missing or non-numeric counters read as 0, except in the catalog where an
//! absent counter stays absent.

use crate::types::{AppStats, CatalogEntry, Product, Rating};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Network key the usage report nests its per-product data under
pub const USAGE_NETWORK: &str = "apple:analytics";

/// Keeps every product the sales report returned, whether or not it was requested.
pub fn sales_from_report(report: &Value) -> BTreeMap<String, AppStats> {
    let Some(entries) = report.as_object() else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .map(|(id, entry)| {
            let stats = AppStats {
                downloads: Some(count_or_zero(entry, "downloads")),
                ..Default::default()
            };
            (id.clone(), stats)
        })
        .collect()
}

/// Keeps only requested products that have usage data.
pub fn usage_from_report(report: &Value, product_ids: &[u64]) -> BTreeMap<String, AppStats> {
    let Some(network) = report.get(USAGE_NETWORK).filter(|v| is_truthy(v)) else {
        tracing::info!("No {USAGE_NETWORK} data found in usage report");
        return BTreeMap::new();
    };

    product_ids
        .iter()
        .map(u64::to_string)
        .filter_map(|id| {
            let entry = network.get(&id).filter(|v| is_truthy(v))?;
            let stats = AppStats {
                impressions: Some(count_or_zero(entry, "impressions")),
                app_store_views: Some(count_or_zero(entry, "app_store_views")),
                ..Default::default()
            };
            Some((id, stats))
        })
        .collect()
}

/// Every requested product gets a key; `None` when the report has nothing for it.
pub fn ratings_from_report(
    report: &Value,
    product_ids: &[u64],
) -> BTreeMap<String, Option<Rating>> {
    product_ids
        .iter()
        .map(u64::to_string)
        .map(|id| {
            let rating = report
                .get(&id)
                .filter(|v| is_truthy(v))
                .map(|entry| Rating {
                    stars: entry.get("stars").and_then(Value::as_f64).unwrap_or(0.0),
                    count: count_or_zero(entry, "total_rating_count"),
                });
            (id, rating)
        })
        .collect()
}

/// Flattens the aggregator response into one entry per product, ordered by
/// numeric product id. Entries whose product fields do not fit [`Product`]
/// are skipped.
pub fn catalog_from_aggregate(aggregate: &Value) -> Vec<CatalogEntry> {
    let Some(entries) = aggregate.as_object() else {
        return Vec::new();
    };

    let mut keyed: Vec<(&String, &Value)> = entries.iter().collect();
    keyed.sort_by_key(|(key, _)| (key.parse::<u64>().map_err(|_| ()), *key));

    keyed
        .into_iter()
        .filter_map(|(key, entry)| {
            let product_json = entry.get("product").filter(|v| is_truthy(v)).unwrap_or(entry);
            let product: Product = match serde_json::from_value(product_json.clone()) {
                Ok(product) => product,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping malformed catalog entry");
                    return None;
                }
            };

            let mut stats = Map::new();
            for section in ["sales", "usage"] {
                if let Some(fields) = entry.get(section).and_then(Value::as_object) {
                    stats.extend(fields.clone());
                }
            }

            Some(CatalogEntry {
                product,
                stats: AppStats {
                    downloads: optional_count(&stats, "downloads"),
                    impressions: optional_count(&stats, "impressions"),
                    app_store_views: optional_count(&stats, "app_store_views"),
                },
                rating: entry.get("ratings").filter(|v| is_truthy(v)).cloned(),
            })
        })
        .collect()
}

/// Compact rendering of a counter: `N/A`, `999`, `1.5K`, `2.3M`.
pub fn format_count(count: Option<u64>) -> String {
    match count {
        None => "N/A".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

fn count_or_zero(entry: &Value, field: &str) -> u64 {
    entry.get(field).and_then(as_count).unwrap_or(0)
}

fn optional_count(fields: &Map<String, Value>, field: &str) -> Option<u64> {
    fields.get(field).and_then(as_count)
}

fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}
