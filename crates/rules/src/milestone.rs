//! Milestone dedup: celebrate each threshold of a growing metric once.
//!
//! A [`MilestoneTracker`] owns one persisted bucket. Milestones are marked
//! celebrated during the check itself, before any notification is sent, so a
//! crash between marking and sending loses the notification instead of
//! repeating it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state;

/// A named threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub threshold: f64,
}

impl Milestone {
    pub fn new(id: impl Into<String>, threshold: f64) -> Self {
        Self {
            id: id.into(),
            threshold,
        }
    }

    /// Build a list ordered by ascending threshold.
    pub fn ladder<S: Into<String>>(steps: impl IntoIterator<Item = (S, f64)>) -> Vec<Milestone> {
        let mut ladder: Vec<Milestone> = steps
            .into_iter()
            .map(|(id, threshold)| Milestone::new(id, threshold))
            .collect();
        ladder.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        ladder
    }
}

/// On-disk shape of a tracker bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneState {
    /// Site → celebrated milestone ids.
    #[serde(default)]
    pub celebrated: BTreeMap<String, BTreeSet<String>>,
    /// Celebrated ids of checks that are not site-scoped. Kept apart from
    /// `celebrated` so no site name can alias it.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub global: BTreeSet<String>,
    /// Epoch millis of the most recent celebration across all entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_celebration_ms: Option<i64>,
}

#[derive(Debug, Default)]
pub struct MilestoneTracker {
    state: MilestoneState,
    path: Option<PathBuf>,
    cooldown: Option<Duration>,
}

impl MilestoneTracker {
    /// Tracker without a backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the bucket at `path`; missing or corrupt means nothing celebrated.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state: MilestoneState = state::load_or_default(&path);
        debug!(
            path = %path.display(),
            entities = state.celebrated.len(),
            "milestone state loaded"
        );
        Self {
            state,
            path: Some(path),
            cooldown: None,
        }
    }

    /// Minimum spacing between any two celebrations. Zero disables it.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = (!cooldown.is_zero()).then_some(cooldown);
        self
    }

    /// Return the milestones newly crossed by `value` and mark them celebrated.
    ///
    /// A milestone is newly crossed when `value >= threshold` and its id is
    /// not yet celebrated for `site` (or globally when `site` is `None`).
    /// Without a cooldown every newly crossed milestone is returned in
    /// ascending order. With a cooldown, nothing is returned or marked while
    /// it is running, and otherwise only the highest is returned while the
    /// lower ones are marked silently.
    pub fn check_and_mark(
        &mut self,
        value: f64,
        milestones: &[Milestone],
        site: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<Milestone> {
        let mut crossed: Vec<Milestone> = milestones
            .iter()
            .filter(|m| value >= m.threshold && !self.is_celebrated(&m.id, site))
            .cloned()
            .collect();
        if crossed.is_empty() {
            return crossed;
        }
        if self.in_cooldown(now) {
            debug!(site = site.unwrap_or("-"), pending = crossed.len(), "milestones held back by cooldown");
            return Vec::new();
        }
        crossed.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

        let set = self.bucket_mut(site);
        for m in &crossed {
            set.insert(m.id.clone());
        }
        self.state.last_celebration_ms = Some(now.timestamp_millis());
        self.persist();

        if self.cooldown.is_some() && crossed.len() > 1 {
            let skipped: Vec<&str> = crossed[..crossed.len() - 1]
                .iter()
                .map(|m| m.id.as_str())
                .collect();
            info!(site = site.unwrap_or("-"), ?skipped, "burst of milestones, reporting only the highest");
            return crossed.split_off(crossed.len() - 1);
        }
        crossed
    }

    /// Categorical variant: mark `id` and return `true` if it was not yet
    /// celebrated for `site` and no cooldown is running.
    pub fn mark_if_new(&mut self, id: &str, site: Option<&str>, now: DateTime<Utc>) -> bool {
        if self.is_celebrated(id, site) || self.in_cooldown(now) {
            return false;
        }
        self.bucket_mut(site).insert(id.to_string());
        self.state.last_celebration_ms = Some(now.timestamp_millis());
        self.persist();
        true
    }

    pub fn is_celebrated(&self, id: &str, site: Option<&str>) -> bool {
        match site {
            Some(site) => self
                .state
                .celebrated
                .get(site)
                .is_some_and(|set| set.contains(id)),
            None => self.state.global.contains(id),
        }
    }

    /// Whether the global cooldown suppresses celebrations at `now`.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match (self.cooldown, self.state.last_celebration_ms) {
            (Some(cooldown), Some(last)) => {
                let elapsed = i128::from(now.timestamp_millis()) - i128::from(last);
                elapsed < cooldown.as_millis() as i128
            }
            _ => false,
        }
    }

    pub fn state(&self) -> &MilestoneState {
        &self.state
    }

    fn bucket_mut(&mut self, site: Option<&str>) -> &mut BTreeSet<String> {
        match site {
            Some(site) => self.state.celebrated.entry(site.to_string()).or_default(),
            None => &mut self.state.global,
        }
    }

    // A failed write keeps the in-memory decision for this process lifetime.
    fn persist(&self) {
        if let Some(ref path) = self.path {
            state::save(path, &self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_ladder() -> Vec<Milestone> {
        Milestone::ladder([("1TB", 1e12), ("100GB", 1e11)])
    }

    fn ids(ms: &[Milestone]) -> Vec<&str> {
        ms.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn ladder_sorts_by_threshold() {
        assert_eq!(ids(&bytes_ladder()), vec!["100GB", "1TB"]);
    }

    #[test]
    fn crossing_sequence_reports_each_once() {
        let mut tracker = MilestoneTracker::in_memory();
        let ladder = bytes_ladder();
        let now = Utc::now();

        assert!(tracker.check_and_mark(5e10, &ladder, Some("siteA"), now).is_empty());
        assert_eq!(ids(&tracker.check_and_mark(1.1e11, &ladder, Some("siteA"), now)), vec!["100GB"]);
        assert_eq!(ids(&tracker.check_and_mark(1.05e12, &ladder, Some("siteA"), now)), vec!["1TB"]);
        assert!(tracker.check_and_mark(2e12, &ladder, Some("siteA"), now).is_empty());
    }

    #[test]
    fn at_most_once_over_repeated_observations() {
        let ladder = Milestone::ladder([("t1", 10.0), ("t2", 20.0), ("t3", 30.0)]);
        let mut tracker = MilestoneTracker::in_memory();
        let now = Utc::now();
        let mut seen: Vec<String> = Vec::new();
        for value in [5.0, 10.0, 12.0, 19.0, 25.0, 25.0, 31.0, 40.0, 50.0] {
            for m in tracker.check_and_mark(value, &ladder, None, now) {
                seen.push(m.id);
            }
        }
        assert_eq!(seen, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn jump_without_cooldown_reports_all_ascending() {
        let mut tracker = MilestoneTracker::in_memory();
        let crossed = tracker.check_and_mark(5e12, &bytes_ladder(), None, Utc::now());
        assert_eq!(ids(&crossed), vec!["100GB", "1TB"]);
    }

    #[test]
    fn sites_are_isolated() {
        let mut tracker = MilestoneTracker::in_memory();
        let ladder = bytes_ladder();
        let now = Utc::now();
        assert_eq!(ids(&tracker.check_and_mark(2e11, &ladder, Some("siteA"), now)), vec!["100GB"]);
        assert_eq!(ids(&tracker.check_and_mark(2e11, &ladder, Some("siteB"), now)), vec!["100GB"]);
        assert!(tracker.is_celebrated("100GB", Some("siteA")));
        assert!(!tracker.is_celebrated("100GB", None));
    }

    #[test]
    fn site_named_like_global_does_not_alias_it() {
        let mut tracker = MilestoneTracker::in_memory();
        let now = Utc::now();
        assert!(tracker.mark_if_new("8h", None, now));
        assert!(!tracker.is_celebrated("8h", Some("_global")));
        assert!(tracker.mark_if_new("8h", Some("_global"), now));
        assert!(!tracker.mark_if_new("8h", None, now));
    }

    #[test]
    fn cooldown_suppresses_without_marking() {
        let start = Utc::now();
        let mut tracker = MilestoneTracker::in_memory().with_cooldown(Duration::from_secs(3600));
        let ladder = bytes_ladder();

        assert_eq!(ids(&tracker.check_and_mark(2e11, &ladder, Some("siteA"), start)), vec!["100GB"]);

        let soon = start + chrono::Duration::minutes(10);
        assert!(tracker.in_cooldown(soon));
        assert!(tracker.check_and_mark(2e11, &ladder, Some("siteB"), soon).is_empty());
        assert!(!tracker.is_celebrated("100GB", Some("siteB")));

        let later = start + chrono::Duration::minutes(61);
        assert_eq!(ids(&tracker.check_and_mark(2e11, &ladder, Some("siteB"), later)), vec!["100GB"]);
    }

    #[test]
    fn cooldown_burst_reports_highest_only() {
        let mut tracker = MilestoneTracker::in_memory().with_cooldown(Duration::from_secs(60));
        let crossed = tracker.check_and_mark(5e12, &bytes_ladder(), None, Utc::now());
        assert_eq!(ids(&crossed), vec!["1TB"]);
        assert!(tracker.is_celebrated("100GB", None));
    }

    #[test]
    fn zero_cooldown_is_disabled() {
        let mut tracker = MilestoneTracker::in_memory().with_cooldown(Duration::ZERO);
        let now = Utc::now();
        assert!(tracker.mark_if_new("8h", None, now));
        assert!(!tracker.in_cooldown(now));
    }

    #[test]
    fn mark_if_new_is_categorical_dedup() {
        let mut tracker = MilestoneTracker::in_memory();
        let now = Utc::now();
        assert!(tracker.mark_if_new("24h", None, now));
        assert!(!tracker.mark_if_new("24h", None, now));
        assert!(tracker.mark_if_new("24h", Some("siteA"), now));
    }

    #[test]
    fn celebrated_set_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milestones/data.json");
        let now = Utc::now();

        let mut tracker = MilestoneTracker::load(&path);
        tracker.check_and_mark(2e11, &bytes_ladder(), Some("siteA"), now);

        let mut reloaded = MilestoneTracker::load(&path);
        assert!(reloaded.is_celebrated("100GB", Some("siteA")));
        assert_eq!(reloaded.state().last_celebration_ms, Some(now.timestamp_millis()));
        assert!(reloaded.check_and_mark(2e11, &bytes_ladder(), Some("siteA"), now).is_empty());
    }

    #[test]
    fn corrupt_bucket_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let tracker = MilestoneTracker::load(&path);
        assert_eq!(tracker.state(), &MilestoneState::default());
    }
}
