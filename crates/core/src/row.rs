//! Telemetry rows returned by the time-series query executor.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value. Numeric strings are coerced; everything
    /// else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Null | Scalar::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<serde_json::Value> for Scalar {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Scalar::Null,
            serde_json::Value::Bool(b) => Scalar::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            },
            serde_json::Value::String(s) => Scalar::Text(s),
            other => Scalar::Text(other.to_string()),
        }
    }
}

/// One row of a query result: an optional timestamp, grouping tags and
/// field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Scalar>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    /// Numeric field value, `None` when missing, null or non-numeric.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Scalar::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Scalar::as_str)
    }

    /// Tag value, falling back to a text field of the same name (InfluxQL
    /// returns tags as columns when they are selected explicitly).
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .get(name)
            .map(String::as_str)
            .or_else(|| self.text(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(Scalar::Int(3).as_f64(), Some(3.0));
        assert_eq!(Scalar::Text(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(Scalar::Text("fast".into()).as_f64(), None);
        assert_eq!(Scalar::Null.as_f64(), None);
    }

    #[test]
    fn json_values_map_to_scalars() {
        assert_eq!(Scalar::from(serde_json::json!(7)), Scalar::Int(7));
        assert_eq!(Scalar::from(serde_json::json!(7.5)), Scalar::Float(7.5));
        assert_eq!(Scalar::from(serde_json::json!(null)), Scalar::Null);
        assert_eq!(
            Scalar::from(serde_json::json!("oslo")),
            Scalar::Text("oslo".into())
        );
    }

    #[test]
    fn tag_falls_back_to_text_field() {
        let row = Row::new().with_field("site", Scalar::Text("home".into()));
        assert_eq!(row.tag("site"), Some("home"));

        let row = row.with_tag("site", "office");
        assert_eq!(row.tag("site"), Some("office"));
    }
}
