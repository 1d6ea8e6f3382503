//! InfluxQL JSON response model and conversion into [`Row`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use speedwatch_core::{Row, Scalar};

use crate::executor::QueryError;

/// Column holding the point timestamp.
const TIME_COLUMN: &str = "time";

/// Top-level body of a `/query` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfluxResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    /// Request-level error (bad auth, unparseable query).
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one statement in the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: u32,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One series: a measurement plus the tag set of a `GROUP BY`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

impl InfluxResponse {
    /// Parse a raw response body.
    pub fn parse(body: &str) -> Result<Self, QueryError> {
        serde_json::from_str(body).map_err(|e| QueryError::Parse(e.to_string()))
    }

    /// Flatten every series of every statement into rows.
    ///
    /// A request- or statement-level error fails the whole response.
    pub fn into_rows(self) -> Result<Vec<Row>, QueryError> {
        if let Some(err) = self.error {
            return Err(QueryError::Statement(err));
        }

        let mut rows = Vec::new();
        for statement in self.results {
            if let Some(err) = statement.error {
                return Err(QueryError::Statement(err));
            }
            for series in statement.series {
                rows.extend(series.into_rows());
            }
        }
        Ok(rows)
    }
}

impl Series {
    /// Convert value arrays into rows. Short rows are padded with nulls.
    pub fn into_rows(self) -> Vec<Row> {
        let Series {
            tags,
            columns,
            values,
            ..
        } = self;

        values
            .into_iter()
            .map(|mut value_row| {
                value_row.resize(columns.len(), serde_json::Value::Null);
                let mut row = Row {
                    time: None,
                    tags: tags.clone(),
                    fields: BTreeMap::new(),
                };
                for (column, value) in columns.iter().zip(value_row) {
                    if column == TIME_COLUMN {
                        row.time = parse_time(&value);
                    } else {
                        row.fields.insert(column.clone(), Scalar::from(value));
                    }
                }
                row
            })
            .collect()
    }
}

/// Accepts epoch milliseconds (requested with `epoch=ms`) or RFC 3339.
fn parse_time(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}
