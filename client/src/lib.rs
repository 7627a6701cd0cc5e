//! Data access for the portfolio site: the consolidated products listing
//! (cached) and per-product reports read through the appfigures proxy.
pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod reshape;
pub mod service;
pub mod stores;
pub mod types;

#[cfg(test)]
mod testutils;

pub use cache::{CacheStore, Clock, SystemClock, TimedCache};
pub use errors::ClientError;
pub use service::{DataService, FailurePolicy};

/// Builds a data service with the cache store named in `config`.
pub fn build_service(config: &config::Config) -> Result<DataService, ClientError> {
    let cache = TimedCache::new(stores::get_store(&config.cache.store));
    DataService::new(config, cache)
}
