//! `data-milestones`: cumulative transferred bytes per site.

use speedwatch_core::Row;
use speedwatch_rules::{Alert, AlertError, EvalContext, Milestone, MilestoneTracker};

use super::format;

pub const NAME: &str = "data-milestones";

const QUERY: &str =
    r#"SELECT sum("bytes_total") AS "bytes" FROM "speedtest" GROUP BY "site""#;

const GB: f64 = 1e9;
const TB: f64 = 1e12;

/// 100GB, 500GB, then 1-2-5 steps from 1TB to 1PB.
pub fn data_ladder() -> Vec<Milestone> {
    let mut steps = vec![("100GB".to_string(), 100.0 * GB), ("500GB".to_string(), 500.0 * GB)];
    for tb in [1u32, 2, 5, 10, 20, 50, 100, 200, 500] {
        steps.push((format!("{tb}TB"), f64::from(tb) * TB));
    }
    steps.push(("1PB".to_string(), 1000.0 * TB));
    Milestone::ladder(steps)
}

#[derive(Debug)]
pub struct DataMilestones {
    tracker: MilestoneTracker,
    ladder: Vec<Milestone>,
    pending: Vec<(String, Milestone, f64)>,
}

impl DataMilestones {
    pub fn new(tracker: MilestoneTracker) -> Self {
        Self {
            tracker,
            ladder: data_ladder(),
            pending: Vec::new(),
        }
    }
}

impl Alert for DataMilestones {
    fn name(&self) -> &str {
        NAME
    }

    fn cadence(&self) -> &str {
        "15m"
    }

    fn query(&self) -> &str {
        QUERY
    }

    fn condition(&mut self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        self.pending.clear();
        for row in rows.unwrap_or_default() {
            let Some(total) = row.f64("bytes") else {
                continue;
            };
            let site = format::site(row);
            for milestone in self.tracker.check_and_mark(total, &self.ladder, Some(site), ctx.now) {
                self.pending.push((site.to_string(), milestone, total));
            }
        }
        Ok(!self.pending.is_empty())
    }

    fn message(&self, _rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        let lines: Vec<String> = self
            .pending
            .iter()
            .map(|(site, milestone, total)| {
                format!(
                    "🎉 {site} has moved {} of speed-test data (now {}).",
                    milestone.id,
                    format::bytes(*total)
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
