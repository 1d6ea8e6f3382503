mod alerts;
mod cli;
mod runner;
mod startup;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use speedwatch_core::Config;
use speedwatch_notify::SystemLogLayer;

/// Capacity of the log-forwarding buffer; records beyond it are dropped.
const LOG_FORWARD_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    speedwatch_core::config::load_dotenv();
    let cli = cli::Cli::parse();
    let config = Config::from_env();

    let (system_layer, log_rx) = SystemLogLayer::new(
        SystemLogLayer::parse_level(&config.log_forward.level),
        LOG_FORWARD_CAPACITY,
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(system_layer)
        .init();

    cli::dispatch(cli, config, log_rx).await
}
