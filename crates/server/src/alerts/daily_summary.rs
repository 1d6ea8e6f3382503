//! `daily-summary`: yesterday's numbers, once a day.

use chrono_tz::Tz;
use speedwatch_core::Row;
use speedwatch_rules::{Alert, AlertError, EvalContext};

use super::format;

pub const NAME: &str = "daily-summary";

const QUERY: &str = concat!(
    r#"SELECT count("download_mbps") AS "tests", "#,
    r#"mean("download_mbps") AS "download_avg", max("download_mbps") AS "download_max", "#,
    r#"mean("upload_mbps") AS "upload_avg", max("upload_mbps") AS "upload_max", "#,
    r#"mean("ping_ms") AS "ping_avg" "#,
    r#"FROM "speedtest" WHERE time > now() - 24h"#
);

/// Dates its header in `timezone`, the zone whose civil day it runs on.
#[derive(Debug)]
pub struct DailySummary {
    timezone: Tz,
}

impl DailySummary {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Alert for DailySummary {
    fn name(&self) -> &str {
        NAME
    }

    fn cadence(&self) -> &str {
        "daily"
    }

    fn query(&self) -> &str {
        QUERY
    }

    /// Always reports: an empty day is news too.
    fn condition(&mut self, _rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        Ok(true)
    }

    fn message(&self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        let day = ctx.now.with_timezone(&self.timezone).format("%Y-%m-%d");
        let Some(rows) = rows else {
            return Ok(format!(
                "📊 Daily summary {day}: speed-test data could not be fetched."
            ));
        };
        let row = match rows.first() {
            Some(row) if row.f64("tests").unwrap_or(0.0) > 0.0 => row,
            _ => return Ok(format!("📊 Daily summary {day}: no speed tests ran in the last 24h.")),
        };

        let num = |field: &str| {
            row.f64(field)
                .ok_or_else(|| AlertError::MissingField(field.to_string()))
        };
        Ok(format!(
            "📊 Daily summary {day} ({} tests)\n\
             ⬇️ download avg {} / max {}\n\
             ⬆️ upload avg {} / max {}\n\
             📶 ping avg {:.1} ms",
            num("tests")? as u64,
            format::mbps(num("download_avg")?),
            format::mbps(num("download_max")?),
            format::mbps(num("upload_avg")?),
            format::mbps(num("upload_max")?),
            num("ping_avg")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use speedwatch_core::Scalar;

    use super::*;

    fn ctx() -> EvalContext<'static> {
        EvalContext {
            unit: NAME,
            now: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn summarises_the_day() {
        let rows = vec![Row::new()
            .with_field("tests", Scalar::Int(24))
            .with_field("download_avg", Scalar::Float(412.3))
            .with_field("download_max", Scalar::Float(940.0))
            .with_field("upload_avg", Scalar::Float(88.0))
            .with_field("upload_max", Scalar::Float(101.2))
            .with_field("ping_avg", Scalar::Float(7.25))];
        let mut alert = DailySummary::new(Tz::UTC);
        assert!(alert.condition(Some(rows.as_slice()), &ctx()).unwrap());
        let text = alert.message(Some(rows.as_slice()), &ctx()).unwrap();
        assert!(text.starts_with("📊 Daily summary 2026-10-18 (24 tests)"));
        assert!(text.contains("download avg 412.3 Mbps / max 940.0 Mbps"));
        assert!(text.contains("ping avg 7.2 ms") || text.contains("ping avg 7.3 ms"));
    }

    #[test]
    fn reports_empty_and_missing_data() {
        let mut alert = DailySummary::new(Tz::UTC);
        assert!(alert.condition(None, &ctx()).unwrap());
        assert!(alert.message(None, &ctx()).unwrap().contains("could not be fetched"));
        assert!(alert
            .message(Some(&[][..]), &ctx())
            .unwrap()
            .contains("no speed tests ran"));
    }

    #[test]
    fn partial_row_is_an_error() {
        let rows = vec![Row::new().with_field("tests", Scalar::Int(3))];
        let err = DailySummary::new(Tz::UTC).message(Some(rows.as_slice()), &ctx()).unwrap_err();
        assert!(matches!(err, AlertError::MissingField(f) if f == "download_avg"));
    }

    #[test]
    fn header_uses_the_local_civil_day() {
        // 23:30 UTC on the 17th is already the 18th in Oslo.
        let ctx = EvalContext {
            unit: NAME,
            now: Utc.with_ymd_and_hms(2026, 10, 17, 23, 30, 0).unwrap(),
        };
        let oslo = DailySummary::new(chrono_tz::Europe::Oslo);
        assert!(oslo.message(None, &ctx).unwrap().starts_with("📊 Daily summary 2026-10-18:"));
        let utc = DailySummary::new(Tz::UTC);
        assert!(utc.message(None, &ctx).unwrap().starts_with("📊 Daily summary 2026-10-17:"));
    }
}
