//! [`RunScheduler`] — last-run bookkeeping for every alert unit.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::state;

use super::cadence::Cadence;
use super::due::{is_due, marker_for};
use super::entry::{RunMarker, RunState};

/// Tracks when each unit was last evaluated and decides which are due.
///
/// Call [`record_run`](RunScheduler::record_run) after every evaluation pass,
/// whether it notified, skipped or failed, then [`persist`](RunScheduler::persist)
/// once per tick.
#[derive(Debug, Default)]
pub struct RunScheduler {
    state: RunState,
    path: Option<PathBuf>,
    dirty: bool,
}

impl RunScheduler {
    /// In-memory scheduler; [`persist`](Self::persist) is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load run-state from `path`. A missing or corrupt file is a cold start.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state: RunState = state::load_or_default(&path);
        debug!(path = %path.display(), units = state.len(), "run-state loaded");
        Self {
            state,
            path: Some(path),
            dirty: false,
        }
    }

    /// Whether `unit` should be evaluated at `now`.
    pub fn is_due(&self, unit: &str, cadence: &Cadence, now: DateTime<Utc>) -> bool {
        is_due(cadence, self.state.get(unit), now)
    }

    /// Record an evaluation pass of `unit` at `now`.
    pub fn record_run(&mut self, unit: &str, cadence: &Cadence, now: DateTime<Utc>) {
        self.state.insert(unit.to_string(), marker_for(cadence, now));
        self.dirty = true;
    }

    pub fn last_run(&self, unit: &str) -> Option<&RunMarker> {
        self.state.get(unit)
    }

    /// Whether runs were recorded since the last persist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the state file if anything changed. Returns whether a write
    /// happened and succeeded.
    pub fn persist(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        match self.path {
            Some(ref path) => state::save(path, &self.state),
            None => false,
        }
    }

    /// One-line status for operators: cadence, last run and whether it is due.
    pub fn describe(&self, unit: &str, cadence: &Cadence, now: DateTime<Utc>) -> String {
        let last = match self.state.get(unit) {
            Some(RunMarker::At(ms)) => DateTime::<Utc>::from_timestamp_millis(*ms)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| ms.to_string()),
            Some(RunMarker::Day(day)) => day.clone(),
            None => "never".to_string(),
        };
        let due = if self.is_due(unit, cadence, now) { "due" } else { "waiting" };
        format!("{unit}: {cadence}; last run {last}; {due}")
    }

    /// Number of tracked units.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
