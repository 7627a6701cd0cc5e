use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

mod config;
mod fetch;
mod logging;
mod statsd;

#[derive(Parser)]
#[command(version, about = "Appfigures proxy and portfolio stats client")]
struct Cli {
    /// YAML config file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the analytics proxy and its admin listener
    Proxy,
    /// Fetch one resource through the proxy and print it
    Fetch {
        #[arg(value_enum)]
        resource: fetch::Resource,
        /// Comma-separated product ids
        #[arg(long, value_delimiter = ',')]
        products: Vec<u64>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::default(),
    };

    let _sentry = logging::init(config.common.logging.as_ref());
    statsd::init(config.common.metrics.as_ref())?;

    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        CliCommand::Proxy => {
            runtime.block_on(proxy::run(config.proxy(), proxy::resolve_secret()))?;
        }
        CliCommand::Fetch { resource, products } => {
            let service = client::build_service(&config.client())?;
            let output = runtime.block_on(fetch::run(&service, resource, &products))?;
            println!("{output}");
        }
    }

    Ok(())
}
