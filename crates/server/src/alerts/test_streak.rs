//! `test-streak`: hours of uninterrupted successful speed tests.
//!
//! A streak is the run of most recent tests with a positive download result
//! and no gap longer than [`max_gap`] between neighbours. Each streak is keyed
//! by its start time, so a broken and restarted streak earns its rungs again.
//! A streak reaching back to the edge of the query window is past the top
//! rung already and is not checked further.

use chrono::{DateTime, Duration, Utc};
use speedwatch_core::Row;
use speedwatch_rules::{Alert, AlertError, EvalContext, Milestone, MilestoneTracker};

use super::format;

pub const NAME: &str = "test-streak";

const QUERY: &str =
    r#"SELECT "download_mbps" FROM "speedtest" WHERE time > now() - 8d ORDER BY time DESC"#;

const WINDOW_HOURS: i64 = 8 * 24;
const MAX_GAP_MINUTES: i64 = 120;

/// Longest silence that still counts as the same streak.
pub fn max_gap() -> Duration {
    Duration::minutes(MAX_GAP_MINUTES)
}

pub fn streak_ladder() -> Vec<Milestone> {
    Milestone::ladder([("8h", 8.0), ("24h", 24.0), ("72h", 72.0), ("168h", 168.0)])
}

/// Start of the current streak, `None` when the latest test failed or is
/// older than [`max_gap`].
pub fn streak_start(rows: &[Row], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut tests: Vec<(DateTime<Utc>, bool)> = rows
        .iter()
        .filter_map(|row| {
            let time = row.time?;
            let ok = row.f64("download_mbps").is_some_and(|d| d > 0.0);
            Some((time, ok))
        })
        .collect();
    tests.sort_by(|a, b| b.0.cmp(&a.0));

    let (newest, ok) = *tests.first()?;
    if !ok || now - newest > max_gap() {
        return None;
    }

    let mut start = newest;
    for &(time, ok) in &tests[1..] {
        if !ok || start - time > max_gap() {
            break;
        }
        start = time;
    }
    Some(start)
}

#[derive(Debug)]
pub struct TestStreak {
    tracker: MilestoneTracker,
    ladder: Vec<Milestone>,
    pending: Option<(Milestone, f64)>,
}

impl TestStreak {
    pub fn new(tracker: MilestoneTracker) -> Self {
        Self {
            tracker,
            ladder: streak_ladder(),
            pending: None,
        }
    }
}

impl Alert for TestStreak {
    fn name(&self) -> &str {
        NAME
    }

    fn cadence(&self) -> &str {
        "hourly"
    }

    fn query(&self) -> &str {
        QUERY
    }

    fn condition(&mut self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        self.pending = None;
        let Some(start) = rows.and_then(|rows| streak_start(rows, ctx.now)) else {
            return Ok(false);
        };
        if start <= ctx.now - Duration::hours(WINDOW_HOURS) + max_gap() {
            return Ok(false);
        }
        let hours = (ctx.now - start).num_minutes() as f64 / 60.0;
        let key = start.format("streak-%Y-%m-%dT%H:%MZ").to_string();

        self.pending = self
            .tracker
            .check_and_mark(hours, &self.ladder, Some(&key), ctx.now)
            .pop()
            .map(|m| (m, hours));
        Ok(self.pending.is_some())
    }

    fn message(&self, _rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        let (milestone, hours) = self
            .pending
            .as_ref()
            .ok_or_else(|| AlertError::InvalidData("no streak milestone pending".into()))?;
        Ok(format!(
            "🔥 {} streak! Speed tests have succeeded without a break for {}.",
            milestone.id,
            format::hours(*hours)
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use speedwatch_core::Scalar;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    /// One test per hour for `count` hours back from `end`, failing at the
    /// given offsets.
    fn hourly_until(end: DateTime<Utc>, count: i64, failures: &[i64]) -> Vec<Row> {
        (0..count)
            .map(|h| {
                let download = if failures.contains(&h) { 0.0 } else { 250.0 };
                Row::new()
                    .with_time(end - Duration::hours(h))
                    .with_field("download_mbps", Scalar::Float(download))
            })
            .collect()
    }

    fn hourly(count: i64, failures: &[i64]) -> Vec<Row> {
        hourly_until(now(), count, failures)
    }

    fn ctx(now: DateTime<Utc>) -> EvalContext<'static> {
        EvalContext { unit: NAME, now }
    }

    #[test]
    fn streak_stops_at_failure_or_gap() {
        assert_eq!(streak_start(&hourly(30, &[10]), now()), Some(now() - Duration::hours(9)));
        assert_eq!(streak_start(&hourly(5, &[0]), now()), None);
        assert_eq!(streak_start(&[], now()), None);

        let stale = now() + Duration::hours(3);
        assert_eq!(streak_start(&hourly(5, &[]), stale), None);

        let mut gappy = hourly(3, &[]);
        gappy.push(
            Row::new()
                .with_time(now() - Duration::hours(6))
                .with_field("download_mbps", Scalar::Float(100.0)),
        );
        assert_eq!(streak_start(&gappy, now()), Some(now() - Duration::hours(2)));
    }

    #[test]
    fn celebrates_rungs_once_per_streak() {
        let mut alert = TestStreak::new(MilestoneTracker::in_memory());

        let rows = hourly(10, &[]);
        assert!(alert.condition(Some(rows.as_slice()), &ctx(now())).unwrap());
        assert_eq!(
            alert.message(None, &ctx(now())).unwrap(),
            "🔥 8h streak! Speed tests have succeeded without a break for 9h."
        );
        assert!(!alert.condition(Some(rows.as_slice()), &ctx(now())).unwrap());

        // Same streak twenty hours later: only the next rung is new.
        let later = now() + Duration::hours(20);
        let rows = hourly_until(later, 30, &[]);
        assert!(alert.condition(Some(rows.as_slice()), &ctx(later)).unwrap());
        assert_eq!(
            alert.message(None, &ctx(later)).unwrap(),
            "🔥 24h streak! Speed tests have succeeded without a break for 29h."
        );
    }

    #[test]
    fn restarted_streak_earns_rungs_again() {
        let mut alert = TestStreak::new(MilestoneTracker::in_memory());
        assert!(alert.condition(Some(hourly(10, &[]).as_slice()), &ctx(now())).unwrap());

        let later = now() + Duration::hours(12);
        let rows = hourly_until(later, 20, &[10]);
        assert!(alert.condition(Some(rows.as_slice()), &ctx(later)).unwrap());
        assert!(alert.message(None, &ctx(later)).unwrap().starts_with("🔥 8h streak!"));
    }

    #[test]
    fn streak_at_window_edge_is_saturated() {
        let mut alert = TestStreak::new(MilestoneTracker::in_memory());
        let rows = hourly(8 * 24, &[]);
        assert!(!alert.condition(Some(rows.as_slice()), &ctx(now())).unwrap());
    }

    #[test]
    fn no_data_no_streak() {
        let mut alert = TestStreak::new(MilestoneTracker::in_memory());
        assert!(!alert.condition(None, &ctx(now())).unwrap());
        assert!(alert.message(None, &ctx(now())).is_err());
    }
}
