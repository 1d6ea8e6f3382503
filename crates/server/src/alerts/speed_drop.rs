//! `speed-drop`: latest download per site below a threshold.

use std::collections::BTreeSet;

use speedwatch_core::Row;
use speedwatch_rules::{Alert, AlertError, EvalContext};
use tracing::debug;

use super::format;

pub const NAME: &str = "speed-drop";

const QUERY: &str = r#"SELECT last("download_mbps") AS "download_mbps" FROM "speedtest" WHERE time > now() - 30m GROUP BY "site""#;

/// Fires when a site drops below the threshold. A site that stays slow is
/// reported once, again only after it recovered and dropped again.
#[derive(Debug)]
pub struct SpeedDrop {
    threshold_mbps: f64,
    slow: BTreeSet<String>,
    pending: Vec<(String, f64)>,
}

impl SpeedDrop {
    pub fn new(threshold_mbps: f64) -> Self {
        Self {
            threshold_mbps,
            slow: BTreeSet::new(),
            pending: Vec::new(),
        }
    }
}

impl Alert for SpeedDrop {
    fn name(&self) -> &str {
        NAME
    }

    fn cadence(&self) -> &str {
        "5m"
    }

    fn query(&self) -> &str {
        QUERY
    }

    fn condition(&mut self, rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        self.pending.clear();
        // No data says nothing about speed; keep the previous picture.
        let Some(rows) = rows else {
            return Ok(false);
        };

        let mut slow_now = BTreeSet::new();
        for row in rows {
            let site = format::site(row);
            let Some(download) = row.f64("download_mbps") else {
                debug!(site, "row without download_mbps, skipped");
                continue;
            };
            if download < self.threshold_mbps {
                slow_now.insert(site.to_string());
                if !self.slow.contains(site) {
                    self.pending.push((site.to_string(), download));
                }
            }
        }
        self.slow = slow_now;
        Ok(!self.pending.is_empty())
    }

    fn message(&self, _rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        let mut text = format!(
            "🐢 Download speed dropped below {}:",
            format::mbps(self.threshold_mbps)
        );
        for (site, download) in &self.pending {
            text.push_str(&format!("\n• {site}: {}", format::mbps(*download)));
        }
        Ok(text)
    }
}
