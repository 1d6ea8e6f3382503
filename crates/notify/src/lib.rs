//! Notification delivery for speed-test alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Discord webhook notifier implementation
//! - Dispatcher that routes messages to the primary or system channel
//! - A tracing layer that forwards WARN/ERROR records to the system channel

pub mod dispatcher;
pub mod log_forward;
pub mod traits;
pub mod webhook;

pub use dispatcher::{Delivery, Dispatcher};
pub use log_forward::{spawn_forwarder, ForwardedRecord, SystemLogLayer, REPORTED_TARGET};
pub use traits::{Notifier, NotifyError, Route};
pub use webhook::DiscordWebhookNotifier;
