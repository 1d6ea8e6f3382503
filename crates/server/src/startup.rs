//! Process wiring: channels, state, executor and runner.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use speedwatch_core::Config;
use speedwatch_influx::{InfluxClient, InfluxConfig};
use speedwatch_notify::{DiscordWebhookNotifier, Dispatcher, Notifier};
use speedwatch_rules::{ChaosScheduler, RunScheduler, StateDir};

use crate::alerts;
use crate::runner::Runner;

/// Build the primary and system channels from config. A channel that fails
/// to initialise is left unconfigured.
pub fn build_dispatcher(config: &Config) -> Dispatcher {
    let username = config.discord.username.clone();
    let timeout = Duration::from_secs(config.discord.timeout_secs);
    let channel = |name: &str, url: Option<&String>| -> Option<Box<dyn Notifier>> {
        let url = url?;
        match DiscordWebhookNotifier::new(name, url, username.clone(), timeout) {
            Ok(n) => Some(Box::new(n)),
            Err(e) => {
                warn!(channel = name, error = %e, "notification channel disabled");
                None
            }
        }
    };
    Dispatcher::new(
        channel("discord:primary", config.discord.webhook_url.as_ref()),
        channel("discord:system", config.discord.system_webhook_url.as_ref()),
    )
}

/// Resolve the state directory, load persisted state and register the
/// built-in alerts.
pub fn build_runner(config: &Config, dispatcher: Arc<Dispatcher>) -> anyhow::Result<Runner> {
    let state = StateDir::resolve(&config.state.dir);

    let influx = InfluxConfig::from_env();
    influx.log_summary();
    let executor = Arc::new(InfluxClient::new(influx)?);

    let registry = alerts::build_registry(config, &state)?;
    let scheduler = RunScheduler::load(state.run_state());
    let chaos = ChaosScheduler::load(config.chaos.clone(), state.chaos_state());

    info!(
        units = registry.len(),
        state_dir = %state.root().display(),
        "runner ready"
    );
    Ok(Runner::new(registry, scheduler, chaos, executor, dispatcher))
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedwatch_notify::Route;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(&move |key: &str| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn dispatcher_routes_follow_config() {
        let d = build_dispatcher(&config(&[]));
        assert!(!d.has_route(Route::Primary));
        assert!(!d.has_route(Route::System));

        let d = build_dispatcher(&config(&[(
            "DISCORD_WEBHOOK_URL",
            "https://discord.com/api/webhooks/1/abc",
        )]));
        assert!(d.has_route(Route::Primary));
        assert!(!d.has_route(Route::System));
    }

    #[test]
    fn broken_webhook_url_disables_channel() {
        let d = build_dispatcher(&config(&[(
            "DISCORD_SYSTEM_WEBHOOK_URL",
            "${SPEEDWATCH_TEST_SURELY_UNSET_VAR}",
        )]));
        assert!(!d.has_route(Route::System));
    }
}
