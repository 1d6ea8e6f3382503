//! Persisted last-run markers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What was recorded the last time a unit was evaluated.
///
/// Interval and chaos units store epoch milliseconds; daily units store the
/// local `YYYY-MM-DD` of the run, so a restart later that day does not fire
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunMarker {
    At(i64),
    Day(String),
}

/// Unit name → last-run marker. Ordered so the state file diffs cleanly.
pub type RunState = BTreeMap<String, RunMarker>;
