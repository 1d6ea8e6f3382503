//! Due-check helpers per cadence kind.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use super::cadence::Cadence;
use super::entry::RunMarker;

/// Whether a unit with `cadence` and last marker `last` should run at `now`.
pub(crate) fn is_due(cadence: &Cadence, last: Option<&RunMarker>, now: DateTime<Utc>) -> bool {
    match cadence {
        Cadence::Interval { every } => is_interval_due(*every, last, now),
        Cadence::Chaos { check_every } => is_interval_due(*check_every, last, now),
        Cadence::DailyAtHour { hour, timezone } => is_daily_due(*hour, *timezone, last, now),
    }
}

/// The marker to store after running `cadence` at `now`.
pub(crate) fn marker_for(cadence: &Cadence, now: DateTime<Utc>) -> RunMarker {
    match cadence {
        Cadence::DailyAtHour { timezone, .. } => RunMarker::Day(local_day(*timezone, now)),
        Cadence::Interval { .. } | Cadence::Chaos { .. } => RunMarker::At(now.timestamp_millis()),
    }
}

/// Due iff `now - last >= every`. No marker counts as a run at epoch 0, so
/// a cold start is always due. A date marker left over from a cadence change
/// is treated the same way.
pub(crate) fn is_interval_due(every: Duration, last: Option<&RunMarker>, now: DateTime<Utc>) -> bool {
    let last_ms = match last {
        Some(RunMarker::At(ms)) => *ms,
        Some(RunMarker::Day(_)) | None => 0,
    };
    let elapsed_ms = i128::from(now.timestamp_millis()) - i128::from(last_ms);
    elapsed_ms >= every.as_millis() as i128
}

/// Due iff the local hour equals `hour` and today's local date has not been
/// recorded yet.
pub(crate) fn is_daily_due(hour: u32, tz: Tz, last: Option<&RunMarker>, now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&tz);
    if local.hour() != hour {
        return false;
    }
    let today = local_day(tz, now);
    !matches!(last, Some(RunMarker::Day(day)) if *day == today)
}

/// `YYYY-MM-DD` of `now` in `tz`.
pub(crate) fn local_day(tz: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d").to_string()
}
