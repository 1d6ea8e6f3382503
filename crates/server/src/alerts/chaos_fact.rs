//! `chaos-fact`: an unprompted fun fact about today's fastest test.

use speedwatch_core::Row;
use speedwatch_rules::{Alert, AlertError, EvalContext, MilestoneTracker};

use super::format;

pub const NAME: &str = "chaos-fact";

const QUERY: &str = r#"SELECT max("download_mbps") AS "download_mbps" FROM "speedtest" WHERE time > now() - 24h GROUP BY "site""#;

/// Things to download, with their size in bytes.
const PAYLOADS: [(&str, f64); 4] = [
    ("a 700 MB CD image", 0.7e9),
    ("a 20 GB 4K movie", 20e9),
    ("the 22 GB text of English Wikipedia", 22e9),
    ("a 60 GB game", 60e9),
];

#[derive(Debug, Clone, PartialEq)]
struct Fastest {
    site: String,
    download_mbps: f64,
    at_ms: i64,
}

/// Tells each record once; `tracker` remembers which ones were told.
#[derive(Debug)]
pub struct ChaosFact {
    tracker: MilestoneTracker,
    pending: Option<Fastest>,
}

impl ChaosFact {
    pub fn new(tracker: MilestoneTracker) -> Self {
        Self {
            tracker,
            pending: None,
        }
    }
}

fn fastest(rows: &[Row]) -> Option<Fastest> {
    rows.iter()
        .filter_map(|row| {
            let download_mbps = row.f64("download_mbps").filter(|d| *d > 0.0)?;
            Some(Fastest {
                site: format::site(row).to_string(),
                download_mbps,
                at_ms: row.time.map_or(0, |t| t.timestamp_millis()),
            })
        })
        .max_by(|a, b| a.download_mbps.total_cmp(&b.download_mbps))
}

/// Seconds needed to move `bytes` at `mbps`.
fn transfer_secs(bytes: f64, mbps: f64) -> f64 {
    bytes * 8.0 / (mbps * 1e6)
}

fn duration_text(secs: f64) -> String {
    if secs < 90.0 {
        format!("{secs:.0} seconds")
    } else if secs < 5400.0 {
        format!("{:.0} minutes", secs / 60.0)
    } else {
        format!("{:.1} hours", secs / 3600.0)
    }
}

impl Alert for ChaosFact {
    fn name(&self) -> &str {
        NAME
    }

    fn cadence(&self) -> &str {
        "chaos:15m"
    }

    fn query(&self) -> &str {
        QUERY
    }

    fn condition(&mut self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        self.pending = None;
        let Some(best) = rows.and_then(fastest) else {
            return Ok(false);
        };
        let id = format!("{}@{}", best.site, best.at_ms);
        if !self.tracker.mark_if_new(&id, None, ctx.now) {
            return Ok(false);
        }
        self.pending = Some(best);
        Ok(true)
    }

    fn message(&self, _rows: Option<&[Row]>, _ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        let best = self
            .pending
            .as_ref()
            .ok_or_else(|| AlertError::InvalidData("no record pending".into()))?;
        let (what, bytes) = PAYLOADS[(best.at_ms.unsigned_abs() / 1000) as usize % PAYLOADS.len()];
        Ok(format!(
            "🎲 Fun fact: today's fastest test at {} hit {}. At that speed {} downloads in {}.",
            best.site,
            format::mbps(best.download_mbps),
            what,
            duration_text(transfer_secs(bytes, best.download_mbps)),
        ))
    }
}
