use std::env;

use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_DATABASE: &str = "speedtest";

// ── Env helpers (mirrors core/config.rs, kept local so the client is usable standalone) ──

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── InfluxConfig ─────────────────────────────────────────────────

/// Connection settings for the InfluxDB HTTP API.
///
/// Reads from environment variables with optional profile prefix.
/// When `SPEEDWATCH_PROFILE=PROD`, checks `PROD_INFLUX_URL` before `INFLUX_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL, without the `/query` path.
    pub url: String,
    /// Database (InfluxDB 1.x) or DBRP-mapped bucket (2.x).
    pub database: String,
    /// API token. Takes precedence over username/password.
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            token: None,
            username: None,
            password: None,
            timeout_seconds: 30,
        }
    }
}

impl InfluxConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let profile = env_opt("SPEEDWATCH_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        Self::from_env_profiled(&profile)
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "INFLUX_URL", DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            database: profiled_env_or(p, "INFLUX_DATABASE", DEFAULT_DATABASE),
            token: profiled_env_opt(p, "INFLUX_TOKEN"),
            username: profiled_env_opt(p, "INFLUX_USERNAME"),
            password: profiled_env_opt(p, "INFLUX_PASSWORD"),
            timeout_seconds: profiled_env_u64(p, "INFLUX_TIMEOUT_SECS", 30),
        }
    }

    /// Full URL of the InfluxQL query endpoint.
    pub fn query_url(&self) -> String {
        format!("{}/query", self.url.trim_end_matches('/'))
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let auth = if self.token.is_some() {
            "token"
        } else if self.username.is_some() {
            "basic"
        } else {
            "none"
        };
        tracing::info!(
            "  influx:      url={}, db={}, auth={}, timeout={}s",
            self.url,
            self.database,
            auth,
            self.timeout_seconds
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_strips_trailing_slash() {
        let cfg = InfluxConfig {
            url: "http://influx:8086/".into(),
            ..InfluxConfig::default()
        };
        assert_eq!(cfg.query_url(), "http://influx:8086/query");
    }

    #[test]
    fn default_points_at_local_speedtest_db() {
        let cfg = InfluxConfig::default();
        assert_eq!(cfg.query_url(), "http://localhost:8086/query");
        assert_eq!(cfg.database, "speedtest");
    }
}
