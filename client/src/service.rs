use crate::cache::TimedCache;
use crate::config::Config;
use crate::errors::ClientError;
use crate::metrics_defs::REPORT_FAILURES;
use crate::reshape::{
    USAGE_NETWORK, catalog_from_aggregate, ratings_from_report, sales_from_report,
    usage_from_report,
};
use crate::types::{AppStats, CatalogEntry, Rating};
use http::StatusCode;
use serde_json::Value;
use shared::counter;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const PRODUCTS_CACHE_KEY: &str = "appfigures_products";

/// How a report endpoint treats a proxy call that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Every failure reaches the caller.
    Surface,
    /// A 404 means "no data" and yields an empty result. Anything else reaches the caller.
    EmptyOnNotFound,
    /// Every failure is logged and yields an empty result.
    Swallow,
}

pub const SALES_POLICY: FailurePolicy = FailurePolicy::Surface;
pub const USAGE_POLICY: FailurePolicy = FailurePolicy::Swallow;
pub const RATINGS_POLICY: FailurePolicy = FailurePolicy::EmptyOnNotFound;

/// Reads product and report data through the proxy, caching the products listing.
#[derive(Clone)]
pub struct DataService {
    http: reqwest::Client,
    proxy_url: Url,
    aggregator_url: Url,
    cache: TimedCache,
    ttl: Duration,
}

impl DataService {
    pub fn new(config: &Config, cache: TimedCache) -> Result<Self, ClientError> {
        Ok(DataService {
            http: reqwest::Client::builder().build()?,
            proxy_url: config.proxy_url.clone(),
            aggregator_url: config.aggregator_url.clone(),
            cache,
            ttl: config.cache.ttl(),
        })
    }

    /// The consolidated products object from the aggregator, keyed by product id.
    /// Served from the cache while fresh; returned as-is, without reshaping.
    pub async fn fetch_products(&self) -> Result<Value, ClientError> {
        let cached = self
            .cache
            .get::<Value>(PRODUCTS_CACHE_KEY, self.ttl)
            .await
            .filter(|v| !v.is_null());
        if let Some(cached) = cached {
            tracing::debug!("Using cached products data");
            return Ok(cached);
        }

        tracing::debug!(url = %self.aggregator_url, "Fetching products");
        let response = self.http.get(self.aggregator_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "Failed to fetch products");
            return Err(ClientError::ProductsStatus(status));
        }

        let body = response.bytes().await?;
        let data: Value = serde_json::from_slice(&body)?;

        self.cache.set(PRODUCTS_CACHE_KEY, &data).await;
        Ok(data)
    }

    /// The products listing reshaped into one entry per app.
    pub async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ClientError> {
        Ok(catalog_from_aggregate(&self.fetch_products().await?))
    }

    pub async fn fetch_all_time_sales(
        &self,
        product_ids: &[u64],
    ) -> Result<BTreeMap<String, AppStats>, ClientError> {
        let params = [
            ("group_by", "product".to_string()),
            ("products", join_ids(product_ids)),
        ];
        let report = self
            .report("reports/sales", &params, SALES_POLICY)
            .await?;

        Ok(report.map(|r| sales_from_report(&r)).unwrap_or_default())
    }

    /// Never fails: a missing or broken usage report reads as "no data".
    pub async fn fetch_all_time_usage(&self, product_ids: &[u64]) -> BTreeMap<String, AppStats> {
        let params = [
            ("group_by", "network,product".to_string()),
            ("networks", USAGE_NETWORK.to_string()),
            ("products", join_ids(product_ids)),
        ];
        let report = self
            .report("reports/usage", &params, USAGE_POLICY)
            .await
            .ok()
            .flatten();

        report
            .map(|r| usage_from_report(&r, product_ids))
            .unwrap_or_default()
    }

    pub async fn fetch_ratings(
        &self,
        product_ids: &[u64],
    ) -> Result<BTreeMap<String, Option<Rating>>, ClientError> {
        let params = [("products", join_ids(product_ids))];
        let report = self.report("ratings", &params, RATINGS_POLICY).await?;

        Ok(report
            .map(|r| ratings_from_report(&r, product_ids))
            .unwrap_or_default())
    }

    /// Fetches one report through the proxy. `Ok(None)` means the policy turned
    /// a failure into "no data".
    async fn report(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
        policy: FailurePolicy,
    ) -> Result<Option<Value>, ClientError> {
        let result = self.get_report(endpoint, params).await;
        apply_policy(endpoint, result, policy)
    }

    async fn get_report(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ClientError> {
        let url = self.proxy_endpoint(endpoint, params)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(proxy_error(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Parameter values go out unencoded so the proxy relays `,` and `:` as
    /// the analytics API expects them.
    fn proxy_endpoint(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url, ClientError> {
        let base = self.proxy_url.as_str().trim_end_matches('/');
        let query = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        Ok(Url::parse(&format!("{base}/{endpoint}?{query}"))?)
    }
}

fn apply_policy(
    endpoint: &'static str,
    result: Result<Value, ClientError>,
    policy: FailurePolicy,
) -> Result<Option<Value>, ClientError> {
    let error = match result {
        Ok(value) => return Ok(Some(value)),
        Err(e) => e,
    };

    let empty = match policy {
        FailurePolicy::Surface => false,
        FailurePolicy::EmptyOnNotFound => error.is_not_found(),
        FailurePolicy::Swallow => true,
    };

    if empty && error.is_not_found() {
        tracing::debug!(endpoint, "No data for requested products");
        return Ok(None);
    }

    let handling = if empty { "empty" } else { "surfaced" };
    counter!(REPORT_FAILURES, "endpoint" => endpoint, "handling" => handling).increment(1);

    if empty {
        tracing::warn!(endpoint, error = %error, "Report fetch failed, using empty result");
        Ok(None)
    } else {
        tracing::error!(endpoint, error = %error, "Report fetch failed");
        Err(error)
    }
}

/// Builds the error for a non-success proxy answer from its `error` and
/// `details` fields, falling back to the status reason for non-JSON bodies.
fn proxy_error(status: StatusCode, body: &[u8]) -> ClientError {
    let (error, details) = match serde_json::from_slice::<Value>(body) {
        Ok(parsed) => (text_field(&parsed, "error"), text_field(&parsed, "details")),
        Err(_) => (status.canonical_reason().map(String::from), None),
    };

    let message = format!(
        "Proxy error! status: {}. {}. Details: {}",
        status.as_u16(),
        error.as_deref().unwrap_or("Unknown error"),
        details.as_deref().unwrap_or("N/A"),
    );
    ClientError::Proxy { status, message }
}

fn text_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

fn join_ids(product_ids: &[u64]) -> String {
    product_ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
