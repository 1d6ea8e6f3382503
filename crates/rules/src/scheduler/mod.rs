//! Per-unit cadence scheduling with persisted run-state.
//!
//! Each alert unit has one [`Cadence`]: a fixed interval, a calendar-time
//! daily slot, or a chaos check interval. The [`RunScheduler`] records when
//! each unit was last evaluated and answers whether it is due; the
//! [`ChaosScheduler`] adds an escalating coin-flip in front of chaos units.
//!
//! Daily cadences fire at most once per civil day only while the tick period
//! stays at or below one hour; a coarser tick can skip the target hour.

mod cadence;
mod chaos;
mod core;
mod due;
mod entry;


pub use self::cadence::{
    parse_cadence, parse_interval, Cadence, DailyDefaults, DEFAULT_CHAOS_CHECK, DEFAULT_INTERVAL,
};
pub use self::chaos::ChaosScheduler;
pub use self::core::RunScheduler;
pub use self::entry::{RunMarker, RunState};
