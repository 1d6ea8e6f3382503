use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Key lookup used to build a [`Config`]. `from_env` wires this to the
/// process environment; tests pass a map.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(get: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = get(&prefixed).filter(|s| !s.is_empty()) {
            return Some(v);
        }
    }
    get(key).filter(|s| !s.is_empty())
}

fn profiled_or(get: Lookup<'_>, profile: &str, key: &str, default: &str) -> String {
    profiled_opt(get, profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_parse<T: std::str::FromStr>(get: Lookup<'_>, profile: &str, key: &str, default: T) -> T {
    match profiled_opt(get, profile, key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "unparseable config value, using default");
                default
            }
        },
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerConfig,
    pub state: StateConfig,
    pub chaos: ChaosConfig,
    pub milestones: MilestoneConfig,
    pub alerts: AlertsConfig,
    pub discord: DiscordConfig,
    pub log_forward: LogForwardConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SPEEDWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_opt)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(get: Lookup<'_>) -> Self {
        let profile = get("SPEEDWATCH_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        let p = profile.as_str();
        Self {
            profile: profile.clone(),
            scheduler: SchedulerConfig::from_lookup(get, p),
            state: StateConfig::from_lookup(get, p),
            chaos: ChaosConfig::from_lookup(get, p),
            milestones: MilestoneConfig::from_lookup(get, p),
            alerts: AlertsConfig::from_lookup(get, p),
            discord: DiscordConfig::from_lookup(get, p),
            log_forward: LogForwardConfig::from_lookup(get, p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   tick={}s, daily_hour={}, timezone={}",
            self.scheduler.tick_interval_secs,
            self.scheduler.daily_hour,
            self.scheduler.timezone
        );
        tracing::info!("  state:       dir={}", self.state.dir.display());
        tracing::info!(
            "  chaos:       base={}, max_multiplier={}, window={}s",
            self.chaos.base_chance,
            self.chaos.max_multiplier,
            self.chaos.window_secs
        );
        tracing::info!(
            "  discord:     primary={}, system={}, timeout={}s",
            configured(self.discord.webhook_url.is_some()),
            configured(self.discord.system_webhook_url.is_some()),
            self.discord.timeout_secs
        );
        tracing::info!(
            "  log_forward: level={}, interval={}s",
            self.log_forward.level,
            self.log_forward.min_interval_secs
        );
    }
}

fn configured(yes: bool) -> &'static str {
    if yes { "configured" } else { "(none)" }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Orchestration tick period. Daily cadences need this to stay <= 1h.
    pub tick_interval_secs: u64,
    /// Hour (0-23) used by the bare `"daily"` cadence.
    pub daily_hour: u32,
    /// IANA timezone used by the bare `"daily"` cadence.
    pub timezone: String,
}

impl SchedulerConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        let daily_hour: u32 = profiled_parse(get, p, "DAILY_HOUR", 9);
        Self {
            tick_interval_secs: profiled_parse(get, p, "TICK_INTERVAL_SECS", 60),
            daily_hour: daily_hour.min(23),
            timezone: profiled_or(get, p, "TIMEZONE", "UTC"),
        }
    }
}

// ── State ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Preferred directory for persisted state buckets.
    pub dir: PathBuf,
}

impl StateConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_or(get, p, "STATE_DIR", "data/state")),
        }
    }
}

// ── Chaos ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosConfig {
    pub base_chance: f64,
    pub max_multiplier: f64,
    /// Elapsed time (seconds) that corresponds to a multiplier of 1.
    pub window_secs: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.05,
            max_multiplier: 3.0,
            window_secs: 3 * 3600,
        }
    }
}

impl ChaosConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        let d = Self::default();
        Self {
            base_chance: profiled_parse(get, p, "CHAOS_BASE_CHANCE", d.base_chance),
            max_multiplier: profiled_parse(get, p, "CHAOS_MAX_MULTIPLIER", d.max_multiplier),
            window_secs: profiled_parse(get, p, "CHAOS_WINDOW_SECS", d.window_secs),
        }
    }
}

// ── Milestones ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneConfig {
    /// Minimum spacing between any two celebrations (0 = off).
    pub cooldown_secs: u64,
}

impl MilestoneConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        Self {
            cooldown_secs: profiled_parse(get, p, "MILESTONE_COOLDOWN_SECS", 0),
        }
    }
}

// ── Alert thresholds ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Download speed (Mbps) below which the speed-drop alert fires.
    pub speed_drop_mbps: f64,
}

impl AlertsConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        Self {
            speed_drop_mbps: profiled_parse(get, p, "SPEED_DROP_MBPS", 50.0),
        }
    }
}

// ── Discord ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub system_webhook_url: Option<String>,
    /// Display name used for webhook posts.
    pub username: Option<String>,
    /// Per-request timeout for webhook posts.
    pub timeout_secs: u64,
}

impl DiscordConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        Self {
            webhook_url: profiled_opt(get, p, "DISCORD_WEBHOOK_URL"),
            system_webhook_url: profiled_opt(get, p, "DISCORD_SYSTEM_WEBHOOK_URL"),
            username: profiled_opt(get, p, "DISCORD_USERNAME"),
            timeout_secs: profiled_parse(get, p, "DISCORD_TIMEOUT_SECS", 10),
        }
    }
}

// ── Log forwarding ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogForwardConfig {
    /// "warn" or "error".
    pub level: String,
    pub min_interval_secs: u64,
}

impl LogForwardConfig {
    fn from_lookup(get: Lookup<'_>, p: &str) -> Self {
        Self {
            level: profiled_or(get, p, "LOG_FORWARD_LEVEL", "warn").to_lowercase(),
            min_interval_secs: profiled_parse(get, p, "LOG_FORWARD_INTERVAL_SECS", 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(&move |k: &str| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_empty() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.scheduler.tick_interval_secs, 60);
        assert_eq!(cfg.scheduler.daily_hour, 9);
        assert_eq!(cfg.scheduler.timezone, "UTC");
        assert_eq!(cfg.chaos, ChaosConfig::default());
        assert_eq!(cfg.state.dir, PathBuf::from("data/state"));
        assert!(cfg.discord.webhook_url.is_none());
        assert_eq!(cfg.discord.timeout_secs, 10);
        assert_eq!(cfg.log_forward.level, "warn");
    }

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        let cfg = config_from(&[
            ("SPEEDWATCH_PROFILE", "prod"),
            ("TICK_INTERVAL_SECS", "30"),
            ("PROD_TICK_INTERVAL_SECS", "120"),
            ("TIMEZONE", "Europe/Oslo"),
        ]);
        assert_eq!(cfg.profile_label(), "PROD");
        assert_eq!(cfg.scheduler.tick_interval_secs, 120);
        assert_eq!(cfg.scheduler.timezone, "Europe/Oslo");
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let cfg = config_from(&[("CHAOS_BASE_CHANCE", "lots"), ("DAILY_HOUR", "42")]);
        assert_eq!(cfg.chaos.base_chance, 0.05);
        assert_eq!(cfg.scheduler.daily_hour, 23);
    }

    #[test]
    fn empty_webhook_is_unset() {
        let cfg = config_from(&[("DISCORD_WEBHOOK_URL", "")]);
        assert!(cfg.discord.webhook_url.is_none());
    }
}
