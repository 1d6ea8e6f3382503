//! Cadence strings ("5m", "daily", "chaos:15m") and their parsed form.

use std::fmt;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

use speedwatch_core::config::SchedulerConfig;

/// Fallback for unrecognized or empty cadence strings.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Check interval of a bare `"chaos"` cadence.
pub const DEFAULT_CHAOS_CHECK: Duration = Duration::from_secs(15 * 60);

const CHAOS_PREFIX: &str = "chaos:";

/// How often a unit is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed wall-clock delta since the last run.
    Interval { every: Duration },
    /// Once per civil day in `timezone`, during local hour `hour`.
    DailyAtHour { hour: u32, timezone: Tz },
    /// Evaluated every `check_every`; firing is decided by the chaos scheduler.
    Chaos { check_every: Duration },
}

impl Cadence {
    pub fn is_chaos(&self) -> bool {
        matches!(self, Cadence::Chaos { .. })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Cadence::Interval { .. } => "interval",
            Cadence::DailyAtHour { .. } => "daily",
            Cadence::Chaos { .. } => "chaos",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Interval { every } => write!(f, "every {}", format_duration(*every)),
            Cadence::DailyAtHour { hour, timezone } => {
                write!(f, "daily at {:02}:00 {}", hour, timezone.name())
            }
            Cadence::Chaos { check_every } => {
                write!(f, "chaos, checked every {}", format_duration(*check_every))
            }
        }
    }
}

/// Hour and timezone applied to the bare `"daily"` cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyDefaults {
    pub hour: u32,
    pub timezone: Tz,
}

impl Default for DailyDefaults {
    fn default() -> Self {
        Self {
            hour: 9,
            timezone: Tz::UTC,
        }
    }
}

impl DailyDefaults {
    /// Build from config. An unknown timezone falls back to UTC.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let timezone = match config.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                warn!(timezone = %config.timezone, error = %e, "unknown timezone, using UTC");
                Tz::UTC
            }
        };
        Self {
            hour: config.daily_hour.min(23),
            timezone,
        }
    }
}

/// Parse a cadence string. Never fails: anything unrecognized becomes a
/// one-minute interval and is logged.
///
/// Recognized, in priority order: `daily`; `hourly`, `weekly`, `minute`;
/// `<n>s|m|h|d`; `chaos`; `chaos:<interval>` where the suffix is one of the
/// interval forms.
pub fn parse_cadence(spec: &str, defaults: &DailyDefaults) -> Cadence {
    let trimmed = spec.trim();

    if trimmed == "daily" {
        return Cadence::DailyAtHour {
            hour: defaults.hour,
            timezone: defaults.timezone,
        };
    }

    if let Some(every) = parse_interval(trimmed) {
        return Cadence::Interval { every };
    }

    if trimmed == "chaos" {
        return Cadence::Chaos {
            check_every: DEFAULT_CHAOS_CHECK,
        };
    }

    if let Some(suffix) = trimmed.strip_prefix(CHAOS_PREFIX) {
        if let Some(check_every) = parse_interval(suffix) {
            return Cadence::Chaos { check_every };
        }
    }

    warn!(spec = %spec, "unrecognized cadence, defaulting to every 1m");
    Cadence::Interval {
        every: DEFAULT_INTERVAL,
    }
}

/// Parse the fixed-interval forms: `hourly`, `weekly`, `minute`, or a
/// non-negative integer followed by exactly one of `s`, `m`, `h`, `d`.
pub fn parse_interval(spec: &str) -> Option<Duration> {
    match spec {
        "minute" => return Some(Duration::from_secs(60)),
        "hourly" => return Some(Duration::from_secs(3_600)),
        "weekly" => return Some(Duration::from_secs(7 * 86_400)),
        _ => {}
    }

    let unit = spec.chars().last()?;
    let digits = &spec[..spec.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => return None,
    };

    let value: u64 = digits.parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_secs)
}

/// Render a duration the way cadence strings are written ("90s", "15m").
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        "0s".to_string()
    } else if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
