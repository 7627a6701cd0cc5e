use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber: human-readable output filtered by
/// `RUST_LOG` (default `info`), plus Sentry when a DSN is configured.
///
/// The returned guard flushes Sentry on drop and must live until exit.
pub fn init(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let dsn = config.and_then(|c| c.sentry_dsn.as_deref());

    let guard = dsn.map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    if guard.is_some() {
        tracing::info!("Sentry error reporting enabled");
    }
    guard
}
