//! InfluxDB HTTP query client.
//!
//! Provides [`InfluxClient`] for executing InfluxQL queries over the
//! `/query` endpoint, with per-request timeouts, token or basic auth, and
//! structured result parsing into [`Row`]s.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use speedwatch_core::Row;

use crate::config::InfluxConfig;
use crate::executor::{QueryError, QueryExecutor};
use crate::result::InfluxResponse;

/// Client for executing InfluxQL queries.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    config: InfluxConfig,
    client: reqwest::Client,
}

impl InfluxClient {
    /// Create a new client. The HTTP client is built once and reused
    /// (connection pooling).
    pub fn new(config: InfluxConfig) -> Result<Self, QueryError> {
        if config.url.is_empty() {
            return Err(QueryError::Config("INFLUX_URL must not be empty".into()));
        }
        if config.database.is_empty() {
            return Err(QueryError::Config("INFLUX_DATABASE must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }

    fn request(&self, query: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(self.config.query_url()).query(&[
            ("db", self.config.database.as_str()),
            ("q", query),
            ("epoch", "ms"),
        ]);

        if let Some(ref token) = self.config.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        } else if let Some(ref user) = self.config.username {
            request = request.basic_auth(user, self.config.password.as_deref());
        }

        request
    }
}

#[async_trait::async_trait]
impl QueryExecutor for InfluxClient {
    async fn execute(&self, query: &str) -> Result<Vec<Row>, QueryError> {
        let start = Instant::now();
        debug!(db = %self.config.database, query = %query, "executing influx query");

        let response = self.request(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, body = %body, "influx query returned non-2xx status");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows = InfluxResponse::parse(&body)?.into_rows()?;

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "influx query complete"
        );

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_database_is_rejected() {
        let cfg = InfluxConfig {
            database: String::new(),
            ..InfluxConfig::default()
        };
        match InfluxClient::new(cfg) {
            Err(QueryError::Config(msg)) => assert!(msg.contains("INFLUX_DATABASE")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn request_carries_db_epoch_and_token() {
        let cfg = InfluxConfig {
            token: Some("s3cret".into()),
            ..InfluxConfig::default()
        };
        let client = InfluxClient::new(cfg).unwrap();
        let request = client.request("SELECT 1").build().unwrap();

        let query = request.url().query().unwrap_or_default().to_string();
        assert!(query.contains("db=speedtest"));
        assert!(query.contains("epoch=ms"));
        assert!(query.contains("q=SELECT+1"));
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Token s3cret"
        );
    }

    #[test]
    fn basic_auth_when_no_token() {
        let cfg = InfluxConfig {
            username: Some("reader".into()),
            password: Some("pw".into()),
            ..InfluxConfig::default()
        };
        let client = InfluxClient::new(cfg).unwrap();
        let request = client.request("SELECT 1").build().unwrap();
        let auth = request.headers()[reqwest::header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(auth.starts_with("Basic "));
    }
}
