use crate::cache::DEFAULT_TTL;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000/api/appfigures-proxy";
pub const DEFAULT_AGGREGATOR_URL: &str = "https://appfigures-script.onrender.com/appfigures-data";
pub const DEFAULT_CACHE_DIR: &str = ".folio-cache";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Cache TTL cannot be 0")]
    InvalidTtl,

    #[error("URL must use http or https: {0}")]
    InvalidScheme(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreConfig {
    Filesystem { base_dir: PathBuf },
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Filesystem {
            base_dir: DEFAULT_CACHE_DIR.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Data service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Where the proxy is mounted, including its path prefix
    #[serde(default = "default_proxy_url")]
    pub proxy_url: Url,
    /// Consolidated products endpoint, called directly rather than through the proxy
    #[serde(default = "default_aggregator_url")]
    pub aggregator_url: Url,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            proxy_url: default_proxy_url(),
            aggregator_url: default_aggregator_url(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for url in [&self.proxy_url, &self.aggregator_url] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ValidationError::InvalidScheme(url.to_string()));
            }
        }

        if self.cache.ttl_secs == 0 {
            return Err(ValidationError::InvalidTtl);
        }

        Ok(())
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_proxy_url() -> Url {
    Url::parse(DEFAULT_PROXY_URL).expect("default proxy URL is valid")
}

fn default_aggregator_url() -> Url {
    Url::parse(DEFAULT_AGGREGATOR_URL).expect("default aggregator URL is valid")
}
