//! The query seam between the alert engine and the time-series store.

use speedwatch_core::Row;

/// Errors that can occur while executing a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("query endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query statement failed: {0}")]
    Statement(String),

    #[error("could not parse query response: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Executes an opaque query string and returns the resulting rows.
///
/// The engine never interprets the query text; it only hands it over and
/// treats any error as "rows unavailable".
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Vec<Row>, QueryError>;
}
