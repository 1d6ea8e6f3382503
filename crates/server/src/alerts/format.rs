//! Shared text helpers for alert messages.

use speedwatch_core::Row;

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Decimal (SI) byte count: `1.05 TB`, `512 MB`.
pub fn bytes(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "? B".to_string();
    }
    let mut scaled = value;
    let mut unit = 0;
    while scaled >= 1000.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1000.0;
        unit += 1;
    }
    if unit == 0 || scaled >= 100.0 {
        format!("{:.0} {}", scaled, BYTE_UNITS[unit])
    } else {
        format!("{:.2} {}", scaled, BYTE_UNITS[unit])
    }
}

pub fn mbps(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.2} Gbps", value / 1000.0)
    } else {
        format!("{:.1} Mbps", value)
    }
}

/// Hours as `"36h"` or `"3d 4h"`.
pub fn hours(value: f64) -> String {
    let total = value.max(0.0).floor() as u64;
    if total < 48 {
        format!("{total}h")
    } else {
        format!("{}d {}h", total / 24, total % 24)
    }
}

/// Site tag of a row, `"unknown"` when the series is not grouped by site.
pub fn site(row: &Row) -> &str {
    row.tag("site").unwrap_or("unknown")
}
