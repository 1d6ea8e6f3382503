//! The [`Alert`] trait implemented by every alert unit.

use std::fmt;

use chrono::{DateTime, Utc};
use speedwatch_core::Row;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("alert panicked: {0}")]
    Panicked(String),
}

/// Per-evaluation context handed to conditions and formatters.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub unit: &'a str,
    pub now: DateTime<Utc>,
}

/// One monitored condition.
///
/// `rows` is `None` when the query failed; both `condition` and `message`
/// must cope with it. `message` is only called right after `condition`
/// returned `true` in the same pass, so an alert may stash what `condition`
/// found and format it in `message`.
pub trait Alert: Send {
    /// Unique, stable identifier. Used as the key in every state bucket.
    fn name(&self) -> &str;

    /// Cadence string, e.g. `"5m"`, `"daily"`, `"chaos:15m"`.
    fn cadence(&self) -> &str;

    /// Query handed verbatim to the executor.
    fn query(&self) -> &str;

    fn condition(&mut self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<bool, AlertError>;

    fn message(&self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<String, AlertError>;
}

type ConditionFn = Box<dyn FnMut(Option<&[Row]>, &EvalContext<'_>) -> Result<bool, AlertError> + Send>;
type MessageFn = Box<dyn Fn(Option<&[Row]>, &EvalContext<'_>) -> Result<String, AlertError> + Send>;

/// Closure-backed [`Alert`] for stateless units.
///
/// ```ignore
/// let alert = FnAlert::new("no-data", "hourly", "SELECT count(download) FROM speedtest WHERE time > now() - 1h")
///     .condition(|rows, _| Ok(rows.map_or(true, |r| r.is_empty())))
///     .message(|_, _| Ok("no speed tests in the last hour".into()));
/// ```
pub struct FnAlert {
    name: String,
    cadence: String,
    query: String,
    condition: ConditionFn,
    message: MessageFn,
}

impl FnAlert {
    /// By default the alert fires whenever rows came back and announces
    /// itself by name.
    pub fn new(name: impl Into<String>, cadence: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cadence: cadence.into(),
            query: query.into(),
            condition: Box::new(|rows, _| Ok(rows.is_some_and(|r| !r.is_empty()))),
            message: Box::new(|_, ctx| Ok(format!("{} fired", ctx.unit))),
        }
    }

    pub fn condition<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<&[Row]>, &EvalContext<'_>) -> Result<bool, AlertError> + Send + 'static,
    {
        self.condition = Box::new(f);
        self
    }

    pub fn message<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&[Row]>, &EvalContext<'_>) -> Result<String, AlertError> + Send + 'static,
    {
        self.message = Box::new(f);
        self
    }
}

impl fmt::Debug for FnAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAlert")
            .field("name", &self.name)
            .field("cadence", &self.cadence)
            .finish_non_exhaustive()
    }
}

impl Alert for FnAlert {
    fn name(&self) -> &str {
        &self.name
    }

    fn cadence(&self) -> &str {
        &self.cadence
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn condition(&mut self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<bool, AlertError> {
        (self.condition)(rows, ctx)
    }

    fn message(&self, rows: Option<&[Row]>, ctx: &EvalContext<'_>) -> Result<String, AlertError> {
        (self.message)(rows, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalContext<'static> {
        EvalContext {
            unit: "probe",
            now: Utc::now(),
        }
    }

    #[test]
    fn defaults_fire_on_any_rows() {
        let mut alert = FnAlert::new("probe", "5m", "SELECT 1");
        let rows = vec![Row::new()];
        assert!(!Alert::condition(&mut alert, None, &ctx()).unwrap());
        assert!(!Alert::condition(&mut alert, Some(&[][..]), &ctx()).unwrap());
        assert!(Alert::condition(&mut alert, Some(rows.as_slice()), &ctx()).unwrap());
        assert_eq!(Alert::message(&alert, Some(rows.as_slice()), &ctx()).unwrap(), "probe fired");
    }

    #[test]
    fn custom_closures_are_used() {
        let mut calls = 0u32;
        let mut alert = FnAlert::new("probe", "5m", "SELECT 1")
            .condition(move |_, _| {
                calls += 1;
                Ok(calls > 1)
            })
            .message(|rows, _| match rows {
                None => Err(AlertError::InvalidData("no rows".into())),
                Some(r) => Ok(format!("{} rows", r.len())),
            });

        assert!(!Alert::condition(&mut alert, None, &ctx()).unwrap());
        assert!(Alert::condition(&mut alert, None, &ctx()).unwrap());
        assert!(Alert::message(&alert, None, &ctx()).is_err());
        assert_eq!(Alert::message(&alert, Some(&[][..]), &ctx()).unwrap(), "0 rows");
        assert_eq!(alert.query(), "SELECT 1");
    }
}
