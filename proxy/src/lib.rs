pub mod config;
pub mod cors;
pub mod errors;
pub mod metrics_defs;
mod proxy_service;
pub mod relay;

pub use config::{resolve_secret, resolve_secret_from};
pub use errors::ProxyError;
pub use proxy_service::ProxyService;

use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Serves the proxy and its admin listener until either fails.
pub async fn run(config: config::Config, secret: Option<String>) -> Result<(), ProxyError> {
    let proxy_service = ProxyService::new(&config, secret)?;

    if !proxy_service.is_ready() {
        tracing::error!(
            vars = ?config::PAT_ENV_VARS,
            "Appfigures PAT not set, every proxied request will fail"
        );
    }

    tracing::info!(
        mount_prefix = %config.mount_prefix,
        upstream = %config.upstream_url,
        "Starting appfigures proxy"
    );

    let readiness = proxy_service.clone();
    let admin_service = AdminService::new(move || readiness.is_ready());

    let proxy_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        proxy_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(proxy_task, admin_task)?;
    Ok(())
}
