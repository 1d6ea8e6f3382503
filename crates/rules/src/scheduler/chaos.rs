//! Probability-based firing with escalating likelihood.
//!
//! Each time a chaos unit comes due it flips a biased coin. The bias starts
//! at `base_chance` and grows linearly with time since the unit last fired,
//! reaching `base_chance * max_multiplier` after
//! `max_multiplier * window` without a fire. A unit that never fired sits at
//! the cap.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use speedwatch_core::config::ChaosConfig;

use crate::state;

/// Decides whether a chaos unit fires and remembers when it last did.
#[derive(Debug)]
pub struct ChaosScheduler {
    config: ChaosConfig,
    /// Unit name → last fire (epoch millis).
    last_fire: BTreeMap<String, i64>,
    path: Option<PathBuf>,
    rng: StdRng,
}

impl ChaosScheduler {
    /// In-memory scheduler seeded from OS entropy.
    pub fn new(config: ChaosConfig) -> Self {
        Self {
            config,
            last_fire: BTreeMap::new(),
            path: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Load fire history from `path`. Entries that are not integers are
    /// dropped and treated as "never fired".
    pub fn load(config: ChaosConfig, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw: BTreeMap<String, serde_json::Value> = state::load_or_default(&path);
        let last_fire: BTreeMap<String, i64> = raw
            .into_iter()
            .filter_map(|(unit, value)| value.as_i64().map(|ms| (unit, ms)))
            .collect();
        debug!(path = %path.display(), units = last_fire.len(), "chaos state loaded");
        Self {
            config,
            last_fire,
            path: Some(path),
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source (deterministic tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Firing probability after `elapsed` without a fire (`None` = never).
    ///
    /// `multiplier = min(elapsed / window, max_multiplier)`,
    /// `chance = base_chance * max(1, multiplier)`.
    pub fn chance(&self, elapsed: Option<Duration>) -> f64 {
        let cfg = &self.config;
        let max_multiplier = cfg.max_multiplier.max(1.0);
        let multiplier = match elapsed {
            None => max_multiplier,
            Some(_) if cfg.window_secs == 0 => max_multiplier,
            Some(elapsed) => {
                (elapsed.as_secs_f64() / cfg.window_secs as f64).min(max_multiplier)
            }
        };
        (cfg.base_chance * multiplier.max(1.0)).clamp(0.0, 1.0)
    }

    /// Time since `unit` last fired, `None` if it never did. A fire recorded
    /// in the future counts as zero elapsed.
    pub fn elapsed_since_fire(&self, unit: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.last_fire.get(unit).map(|ms| {
            let delta = now.timestamp_millis().saturating_sub(*ms).max(0);
            Duration::from_millis(delta as u64)
        })
    }

    /// Current firing probability of `unit`.
    pub fn chance_for(&self, unit: &str, now: DateTime<Utc>) -> f64 {
        self.chance(self.elapsed_since_fire(unit, now))
    }

    /// Flip the coin for `unit`. Does not record anything: call
    /// [`record_fire`](Self::record_fire) once the unit's own condition also
    /// passed.
    pub fn should_fire(&mut self, unit: &str, now: DateTime<Utc>) -> bool {
        let chance = self.chance_for(unit, now);
        let roll: f64 = self.rng.gen();
        let fire = roll < chance;
        debug!(unit, chance, roll, fire, "chaos roll");
        fire
    }

    /// Remember that `unit` fired at `now` and persist immediately.
    pub fn record_fire(&mut self, unit: &str, now: DateTime<Utc>) {
        self.last_fire
            .insert(unit.to_string(), now.timestamp_millis());
        if let Some(ref path) = self.path {
            state::save(path, &self.last_fire);
        }
    }

    pub fn last_fire(&self, unit: &str) -> Option<DateTime<Utc>> {
        self.last_fire
            .get(unit)
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(*ms))
    }
}
