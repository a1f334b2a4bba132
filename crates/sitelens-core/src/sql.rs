//! Parameterized query plans.
//!
//! Structural SQL (column names, CTEs, operators picked from a validated AST)
//! is assembled as text; every caller-supplied value goes through
//! [`QueryBuilder::bind`] and reaches the store as a positional parameter.

use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

/// Format used when binding timestamps as text and `CAST`ing them in SQL.
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

/// How a result column is coerced before it leaves the store adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Text,
    /// Engine timestamp rendered as text; converted to an ISO-8601 UTC instant.
    Timestamp,
    /// JSON document stored as text; parsed into a JSON value.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A query ready for execution together with the shape of its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Short name used in logs, e.g. `"overview"`.
    pub label: &'static str,
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Default)]
pub struct QueryBuilder {
    params: Vec<SqlValue>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter and return its `?N` placeholder.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    /// `(?a, ?b, ...)` for an `IN` list.
    pub fn bind_list<I, V>(&mut self, values: I) -> String
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        format!("({})", placeholders.join(", "))
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn finish(self, label: &'static str, sql: String, columns: Vec<Column>) -> QueryPlan {
        QueryPlan {
            label,
            sql,
            params: self.params,
            columns,
        }
    }
}

/// Render a UTC wall-clock timestamp as `2024-01-01T00:00:00.000Z`.
pub fn iso_instant(ts: NaiveDateTime) -> String {
    Utc.from_utc_datetime(&ts)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the text form the store uses for timestamps (`YYYY-MM-DD HH:MM:SS[.fff]`).
pub fn parse_store_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_in_bind_order() {
        let mut q = QueryBuilder::new();
        assert_eq!(q.bind(1_i64), "?1");
        assert_eq!(q.bind("x"), "?2");
        assert_eq!(q.bind_list(["a", "b"]), "(?3, ?4)");
        let plan = q.finish("test", "SELECT 1".to_string(), vec![]);
        assert_eq!(
            plan.params,
            vec![
                SqlValue::Int(1),
                SqlValue::Text("x".into()),
                SqlValue::Text("a".into()),
                SqlValue::Text("b".into()),
            ]
        );
    }

    #[test]
    fn store_timestamps_become_iso_instants() {
        let ts = parse_store_timestamp("2024-01-02 03:04:05").unwrap();
        assert_eq!(iso_instant(ts), "2024-01-02T03:04:05.000Z");
        let frac = parse_store_timestamp("2024-01-02 03:04:05.250").unwrap();
        assert_eq!(iso_instant(frac), "2024-01-02T03:04:05.250Z");
        assert!(parse_store_timestamp("yesterday").is_none());
    }
}
