use crate::config::MetricsConfig;
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Sends every metric recorded through the `metrics` facade to StatsD.
/// Without a config the facade's no-op recorder stays in place.
pub fn init(config: Option<&MetricsConfig>) -> Result<(), MetricsError> {
    let Some(config) = config else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(&config.prefix))?;
    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;

    shared::metrics_defs::describe_all(proxy::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(client::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        prefix = %config.prefix,
        "StatsD metrics enabled"
    );
    Ok(())
}
