use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_MOUNT_PREFIX: &str = "/api/appfigures-proxy";
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.appfigures.com/v2";

/// Environment variables holding the Appfigures personal access token, in lookup order.
/// The second name is the one older deployments used.
pub const PAT_ENV_VARS: [&str; 2] = ["APPFIGURES_PAT", "VITE_APPFIGURES_PAT"];

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Mount prefix must start with '/' and not end with it: {0:?}")]
    InvalidMountPrefix(String),

    #[error("Upstream URL must use http or https: {0}")]
    InvalidUpstreamScheme(String),

    #[error("Upstream timeout cannot be 0")]
    InvalidTimeout,
}

/// Proxy configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for proxied traffic
    #[serde(default = "Listener::proxy_default")]
    pub listener: Listener,
    /// Listener for health and readiness checks
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    /// Path prefix the proxy is mounted at. Everything after it is appended to the upstream URL.
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,
    /// Base URL of the analytics API
    #[serde(default = "default_upstream_url")]
    pub upstream_url: Url,
    /// Optional per-request timeout. Unset means the HTTP client never times out.
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::proxy_default(),
            admin_listener: Listener::admin_default(),
            mount_prefix: default_mount_prefix(),
            upstream_url: default_upstream_url(),
            upstream_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        let prefix = &self.mount_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ValidationError::InvalidMountPrefix(prefix.clone()));
        }

        if !matches!(self.upstream_url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUpstreamScheme(
                self.upstream_url.to_string(),
            ));
        }

        if self.upstream_timeout_secs == Some(0) {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(())
    }

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn proxy_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }

    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_mount_prefix() -> String {
    DEFAULT_MOUNT_PREFIX.to_string()
}

fn default_upstream_url() -> Url {
    Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid")
}

/// Reads the access token from the process environment.
pub fn resolve_secret() -> Option<String> {
    resolve_secret_from(|name| std::env::var(name).ok())
}

/// Returns the first non-empty value among [`PAT_ENV_VARS`].
pub fn resolve_secret_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PAT_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty())
}
