use clap::ValueEnum;
use client::reshape::format_count;
use client::types::CatalogEntry;
use client::{ClientError, DataService};
use std::fmt::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    /// Raw consolidated products object
    Products,
    /// One summary line per app
    Catalog,
    Sales,
    Usage,
    Ratings,
}

impl Resource {
    fn needs_products(self) -> bool {
        matches!(self, Resource::Sales | Resource::Usage | Resource::Ratings)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("--products is required for {0:?}")]
    MissingProducts(Resource),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("could not render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// Runs one fetch and returns what should be printed.
pub async fn run(
    service: &DataService,
    resource: Resource,
    product_ids: &[u64],
) -> Result<String, FetchError> {
    if resource.needs_products() && product_ids.is_empty() {
        return Err(FetchError::MissingProducts(resource));
    }

    let output = match resource {
        Resource::Products => serde_json::to_string_pretty(&service.fetch_products().await?)?,
        Resource::Catalog => render_catalog(&service.fetch_catalog().await?),
        Resource::Sales => {
            serde_json::to_string_pretty(&service.fetch_all_time_sales(product_ids).await?)?
        }
        Resource::Usage => {
            serde_json::to_string_pretty(&service.fetch_all_time_usage(product_ids).await)?
        }
        Resource::Ratings => {
            serde_json::to_string_pretty(&service.fetch_ratings(product_ids).await?)?
        }
    };
    Ok(output)
}

fn render_catalog(catalog: &[CatalogEntry]) -> String {
    let mut out = String::new();
    for entry in catalog {
        let stars = entry
            .rating
            .as_ref()
            .and_then(|r| r.get("stars"))
            .and_then(|s| s.as_f64())
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "N/A".to_string());

        let _ = writeln!(
            out,
            "{:>12}  {:<32} downloads {:>7}  impressions {:>7}  store views {:>7}  stars {}",
            entry.product.id,
            entry.product.name,
            format_count(entry.stats.downloads),
            format_count(entry.stats.impressions),
            format_count(entry.stats.app_store_views),
            stars,
        );
    }
    out
}
