//! Routes messages to the primary or system channel.
//!
//! The dispatcher owns at most one notifier per [`Route`]. A route with no
//! configured channel swallows messages (logged at debug): an unconfigured
//! system channel must not turn every failure into a second failure.

use std::time::Instant;

use crate::traits::{Notifier, NotifyError, Route};

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { channel: String, duration_ms: u64 },
    /// No channel is configured for the route.
    Skipped,
}

/// Dispatches messages to the channel configured for each route.
pub struct Dispatcher {
    primary: Option<Box<dyn Notifier>>,
    system: Option<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(primary: Option<Box<dyn Notifier>>, system: Option<Box<dyn Notifier>>) -> Self {
        Self { primary, system }
    }

    /// Create a dispatcher with no channels (every delivery is skipped).
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    fn channel(&self, route: Route) -> Option<&dyn Notifier> {
        match route {
            Route::Primary => self.primary.as_deref(),
            Route::System => self.system.as_deref(),
        }
    }

    /// Whether a channel is configured for `route`.
    pub fn has_route(&self, route: Route) -> bool {
        self.channel(route).is_some()
    }

    /// Deliver `text` to the channel behind `route`.
    ///
    /// Single attempt, no retry. The error is returned to the caller, which
    /// decides whether a fallback report is worth sending.
    pub async fn deliver(&self, route: Route, text: &str) -> Result<Delivery, NotifyError> {
        let Some(channel) = self.channel(route) else {
            tracing::debug!(%route, "No notification channel configured, message dropped");
            return Ok(Delivery::Skipped);
        };

        let start = Instant::now();
        let result = channel.send(text).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    %route,
                    channel = channel.channel_name(),
                    duration_ms,
                    "Notification delivered"
                );
                Ok(Delivery::Sent {
                    channel: channel.channel_name().to_string(),
                    duration_ms,
                })
            }
            Err(e) => {
                tracing::warn!(
                    %route,
                    channel = channel.channel_name(),
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                Err(e)
            }
        }
    }

    /// Send a test message to every configured channel.
    pub async fn test_all(&self) -> Vec<(Route, Result<(), NotifyError>)> {
        let mut results = Vec::new();
        for route in [Route::Primary, Route::System] {
            if let Some(channel) = self.channel(route) {
                results.push((route, channel.test().await));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _text: &str) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn mock(name: &str, count: &Arc<AtomicUsize>, should_fail: bool) -> Box<dyn Notifier> {
        Box::new(MockNotifier {
            name: name.to_string(),
            send_count: count.clone(),
            should_fail,
        })
    }

    #[tokio::test]
    async fn routes_to_matching_channel() {
        let primary = Arc::new(AtomicUsize::new(0));
        let system = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(
            Some(mock("primary", &primary, false)),
            Some(mock("system", &system, false)),
        );

        let outcome = dispatcher.deliver(Route::System, "boom").await.unwrap();
        assert!(matches!(outcome, Delivery::Sent { ref channel, .. } if channel == "system"));
        assert_eq!(primary.load(Ordering::SeqCst), 0);
        assert_eq!(system.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_route_is_skipped() {
        let primary = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Some(mock("primary", &primary, false)), None);

        assert!(!dispatcher.has_route(Route::System));
        let outcome = dispatcher.deliver(Route::System, "boom").await.unwrap();
        assert_eq!(outcome, Delivery::Skipped);
        assert_eq!(primary.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_returned() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Some(mock("primary", &count, true)), None);
        assert!(dispatcher.deliver(Route::Primary, "hi").await.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_hits_configured_channels_only() {
        let primary = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Some(mock("primary", &primary, false)), None);
        let results = dispatcher.test_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, Route::Primary);
        assert!(results[0].1.is_ok());
        assert_eq!(primary.load(Ordering::SeqCst), 1);
    }
}
