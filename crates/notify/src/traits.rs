//! Notifier trait definition and shared error types.

use std::fmt;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected message with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Logical destination of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Domain notifications (speed drops, milestones, summaries).
    Primary,
    /// Operational reports: failures, forwarded error logs.
    System,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Primary => f.write_str("primary"),
            Route::System => f.write_str("system"),
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message through this channel.
    async fn send(&self, text: &str) -> Result<(), NotifyError>;

    /// Test connectivity with a sample message.
    async fn test(&self) -> Result<(), NotifyError> {
        self.send("[TEST] speedwatch notification channel is reachable.")
            .await
    }

    /// Human-readable name for this channel (e.g., "discord").
    fn channel_name(&self) -> &str;
}
