//! CLI argument parsing and subcommand dispatch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use speedwatch_core::Config;
use speedwatch_notify::{spawn_forwarder, Dispatcher, ForwardedRecord, Route};

use crate::startup;

/// Speed-test telemetry alerts for Discord.
#[derive(Parser, Debug)]
#[command(name = "speedwatch", version, about)]
pub struct Cli {
    /// Tick period in seconds (overrides TICK_INTERVAL_SECS).
    #[arg(long, global = true)]
    pub tick_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the alert loop until SIGINT/SIGTERM (default).
    Run,
    /// Run a single tick and exit.
    Once,
    /// Print every alert unit with its cadence and due status.
    List,
    /// Send a test message to the configured channels.
    TestNotify,
}

pub async fn dispatch(
    cli: Cli,
    mut config: Config,
    log_rx: mpsc::Receiver<ForwardedRecord>,
) -> anyhow::Result<()> {
    if let Some(secs) = cli.tick_secs {
        config.scheduler.tick_interval_secs = secs;
    }
    let command = cli.command.unwrap_or(Command::Run);
    let dispatcher = Arc::new(startup::build_dispatcher(&config));

    match command {
        Command::TestNotify => test_notify(&dispatcher).await,
        Command::List => {
            let runner = startup::build_runner(&config, dispatcher)?;
            for line in runner.status_lines(Utc::now()) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Once => {
            forward_logs(&config, log_rx, dispatcher.clone());
            let mut runner = startup::build_runner(&config, dispatcher)?;
            let report = runner.tick(Utc::now()).await;
            println!(
                "ran {} unit(s): {} notified, {} failed",
                report.ran, report.notified, report.failed
            );
            Ok(())
        }
        Command::Run => {
            config.log_summary();
            if config.scheduler.tick_interval_secs > 3600 {
                tracing::warn!(
                    tick_secs = config.scheduler.tick_interval_secs,
                    "tick period above one hour, daily alerts may be skipped"
                );
            }
            forward_logs(&config, log_rx, dispatcher.clone());
            let runner = startup::build_runner(&config, dispatcher)?;
            let period = Duration::from_secs(config.scheduler.tick_interval_secs.max(1));
            runner.run(period, startup::shutdown_signal()).await;
            info!("speedwatch exited cleanly");
            Ok(())
        }
    }
}

fn forward_logs(config: &Config, rx: mpsc::Receiver<ForwardedRecord>, dispatcher: Arc<Dispatcher>) {
    if !dispatcher.has_route(Route::System) {
        return;
    }
    let min_interval = Duration::from_secs(config.log_forward.min_interval_secs);
    spawn_forwarder(rx, dispatcher, min_interval);
}

async fn test_notify(dispatcher: &Dispatcher) -> anyhow::Result<()> {
    let results = dispatcher.test_all().await;
    if results.is_empty() {
        anyhow::bail!("no notification channel configured (set DISCORD_WEBHOOK_URL)");
    }
    let mut failed = 0;
    for (route, result) in results {
        match result {
            Ok(()) => println!("{route}: ok"),
            Err(e) => {
                failed += 1;
                println!("{route}: FAILED ({e})");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} channel(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["speedwatch"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.tick_secs, None);
    }

    #[test]
    fn parses_subcommands_and_global_flag() {
        let cli = Cli::try_parse_from(["speedwatch", "once", "--tick-secs", "30"]).unwrap();
        assert_eq!(cli.command, Some(Command::Once));
        assert_eq!(cli.tick_secs, Some(30));

        let cli = Cli::try_parse_from(["speedwatch", "test-notify"]).unwrap();
        assert_eq!(cli.command, Some(Command::TestNotify));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["speedwatch", "serve"]).is_err());
    }
}
