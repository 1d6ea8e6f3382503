//! Forwards WARN/ERROR log records to the system channel.
//!
//! [`SystemLogLayer`] is a `tracing_subscriber` layer that copies matching
//! events into a bounded channel; [`spawn_forwarder`] drains that channel and
//! posts each record to [`Route::System`] through a [`RateLimiter`]. Capture
//! never blocks the emitting thread: a full channel drops the record.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::dispatcher::Dispatcher;
use crate::traits::Route;

/// Events from this crate are never forwarded, so a broken system webhook
/// cannot feed its own failures back into the channel.
const SELF_TARGET: &str = "speedwatch_notify";

/// Target for records whose content already went to the system channel by
/// other means. The layer skips them.
pub const REPORTED_TARGET: &str = "speedwatch::reported";

/// A captured log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Tracing layer that captures records at or above `min_level`.
pub struct SystemLogLayer {
    tx: mpsc::Sender<ForwardedRecord>,
    min_level: Level,
}

impl SystemLogLayer {
    /// Create the layer and the receiving end for [`spawn_forwarder`].
    pub fn new(min_level: Level, capacity: usize) -> (Self, mpsc::Receiver<ForwardedRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, min_level }, rx)
    }

    /// `"error"` selects ERROR only; anything else selects WARN and above.
    pub fn parse_level(raw: &str) -> Level {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

impl<S: Subscriber> Layer<S> for SystemLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // More verbose levels compare greater.
        if *meta.level() > self.min_level
            || meta.target().starts_with(SELF_TARGET)
            || meta.target() == REPORTED_TARGET
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = ForwardedRecord {
            level: *meta.level(),
            target: meta.target().to_string(),
            message: visitor.finish(),
        };
        let _ = self.tx.try_send(record);
    }
}

/// Collects the `message` field plus `key=value` pairs for the rest.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Minimum-spacing limiter. Counts what it rejects so the next accepted
/// record can report it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed_since_last)` when a record may pass at `now`.
    pub fn try_acquire(&mut self, now: Instant) -> Option<u64> {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.min_interval {
                self.suppressed += 1;
                return None;
            }
        }
        self.last = Some(now);
        Some(std::mem::take(&mut self.suppressed))
    }
}

/// Render a record for a chat channel.
pub fn format_record(record: &ForwardedRecord, suppressed: u64) -> String {
    let icon = if record.level == Level::ERROR { "🛑" } else { "⚠️" };
    let mut text = format!(
        "{} **{}** `{}`\n{}",
        icon, record.level, record.target, record.message
    );
    if suppressed > 0 {
        let _ = write!(text, "\n_({} earlier record(s) suppressed)_", suppressed);
    }
    text
}

/// Drain captured records into the system channel until every sender is gone.
pub fn spawn_forwarder(
    mut rx: mpsc::Receiver<ForwardedRecord>,
    dispatcher: Arc<Dispatcher>,
    min_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut limiter = RateLimiter::new(min_interval);
        while let Some(record) = rx.recv().await {
            let Some(suppressed) = limiter.try_acquire(Instant::now()) else {
                continue;
            };
            let text = format_record(&record, suppressed);
            if let Err(e) = dispatcher.deliver(Route::System, &text).await {
                tracing::debug!(error = %e, "log forward delivery failed");
            }
        }
    })
}
