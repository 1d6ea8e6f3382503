//! Scheduling and dedup engine for speed-test alert units.
//!
//! This crate provides:
//! - Cadence parsing ("5m", "daily", "chaos:15m") and due-checks
//! - Persisted run-state and probability-based chaos scheduling
//! - A JSON state store tolerant of missing, corrupt and read-only files
//! - Milestone trackers guaranteeing at-most-once celebration per threshold
//! - The `Alert` trait and the static unit registry

pub mod alert;
pub mod milestone;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use alert::{Alert, AlertError, EvalContext, FnAlert};
pub use milestone::{Milestone, MilestoneTracker};
pub use registry::{AlertRegistry, AlertUnit, RegistryError};
pub use scheduler::{parse_cadence, Cadence, ChaosScheduler, DailyDefaults, RunScheduler};
pub use state::StateDir;
