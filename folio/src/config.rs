use client::config::Config as ClientConfig;
use proxy::config::Config as ProxyConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "folio".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Top-level configuration file. Every section is optional and falls back to
/// its defaults when absent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub proxy: Option<ProxyConfig>,
    pub client: Option<ClientConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data: Config = serde_yaml::from_reader(file)?;
        data.validate()?;

        Ok(data)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        if let Some(metrics) = &self.common.metrics {
            if metrics.statsd_port == 0 {
                return Err(ConfigError::InvalidStatsdPort);
            }
        }
        Ok(())
    }

    pub fn proxy(&self) -> ProxyConfig {
        self.proxy.clone().unwrap_or_default()
    }

    pub fn client(&self) -> ClientConfig {
        self.client.clone().unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid proxy config: {0}")]
    Proxy(#[from] proxy::config::ValidationError),
    #[error("invalid client config: {0}")]
    Client(#[from] client::config::ValidationError),
    #[error("StatsD port cannot be 0")]
    InvalidStatsdPort,
}
