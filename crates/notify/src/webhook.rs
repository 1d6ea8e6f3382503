//! Discord webhook notifier.
//!
//! Delivers messages as `{"content": ...}` JSON payloads to a Discord
//! webhook URL. Environment variable references (`${VAR_NAME}`) in the URL
//! are resolved at construction time.

use std::time::Duration;

use serde::Serialize;

use crate::traits::{Notifier, NotifyError};

/// Discord rejects `content` longer than this many characters.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

/// Posts messages to a Discord channel webhook.
#[derive(Debug)]
pub struct DiscordWebhookNotifier {
    /// Target URL (env vars already resolved).
    url: String,
    /// Display name override for posted messages.
    username: Option<String>,
    /// Channel label used in logs ("discord:primary", ...).
    name: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    /// Create a new webhook notifier.
    ///
    /// `${VAR_NAME}` references in `url` are resolved eagerly. Missing env
    /// vars or an empty URL produce a [`NotifyError::Config`] error. Every
    /// request is abandoned after `timeout`.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        username: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(url)?;
        if resolved_url.trim().is_empty() {
            return Err(NotifyError::Config("webhook URL must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout.max(Duration::from_secs(1)))
            .build()?;

        Ok(Self {
            url: resolved_url,
            username,
            name: name.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordWebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let content = truncate_content(text, DISCORD_CONTENT_LIMIT);
        let payload = WebhookPayload {
            content: &content,
            username: self.username.as_deref(),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let retry_after = body
                .get("retry_after")
                .and_then(|v| v.as_f64())
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(5);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                channel = %self.name,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(channel = %self.name, %status, "webhook message delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.name
    }
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate_content(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name).map_err(|_| {
                NotifyError::Config(format!("env var not found: {var_name}"))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
