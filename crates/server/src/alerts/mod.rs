//! Built-in alert units.

pub mod chaos_fact;
pub mod daily_summary;
pub mod data_milestones;
pub mod format;
pub mod speed_drop;
pub mod test_streak;

use std::time::Duration;

use speedwatch_core::Config;
use speedwatch_rules::{AlertRegistry, DailyDefaults, MilestoneTracker, RegistryError, StateDir};

use self::chaos_fact::ChaosFact;
use self::daily_summary::DailySummary;
use self::data_milestones::DataMilestones;
use self::speed_drop::SpeedDrop;
use self::test_streak::TestStreak;

/// Register every built-in unit. Stateful units load their milestone
/// buckets from `state`.
pub fn build_registry(config: &Config, state: &StateDir) -> Result<AlertRegistry, RegistryError> {
    let cooldown = Duration::from_secs(config.milestones.cooldown_secs);
    let tracker = |unit: &str| MilestoneTracker::load(state.milestones(unit)).with_cooldown(cooldown);

    let defaults = DailyDefaults::from_config(&config.scheduler);
    let timezone = defaults.timezone;

    let mut registry = AlertRegistry::new(defaults);
    registry
        .register(Box::new(SpeedDrop::new(config.alerts.speed_drop_mbps)))?
        .register(Box::new(DailySummary::new(timezone)))?
        .register(Box::new(DataMilestones::new(tracker(data_milestones::NAME))))?
        .register(Box::new(TestStreak::new(tracker(test_streak::NAME))))?
        // Told records are dedup state, not celebrations: no cooldown.
        .register(Box::new(ChaosFact::new(MilestoneTracker::load(
            state.milestones(chaos_fact::NAME),
        ))))?;
    Ok(registry)
}
