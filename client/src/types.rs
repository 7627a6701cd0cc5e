use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An app as the analytics API describes it. Missing fields default to empty.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// URL of the app icon
    pub icon: String,
    pub developer: String,
}

/// Counters for one product. Each field is filled by a different report, so
/// any of them may be absent.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct AppStats {
    /// From the sales report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    /// From the usage report, Apple analytics network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impressions: Option<u64>,
    /// From the usage report, Apple analytics network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_store_views: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Rating {
    pub stars: f64,
    pub count: u64,
}

/// A product merged with its stats, as the projects listing consumes it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub product: Product,
    pub stats: AppStats,
    /// Passed through from the aggregator untouched
    pub rating: Option<Value>,
}
