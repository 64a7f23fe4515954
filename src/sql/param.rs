//! Bound query parameters.
//!
//! Values that originate from a request (filter values, LIKE patterns,
//! IN lists, stored filter ids) never become part of the SQL text. They
//! are carried as [`QueryParam`]s next to the SQL and bound by the executor.

use serde::Serialize;
use serde_json::Value;

use super::dialect::Dialect;

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl QueryParam {
    /// Convert a JSON scalar into a parameter.
    ///
    /// Booleans bind as 1/0. Arrays and objects bind as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => QueryParam::Null,
            Value::Bool(b) => QueryParam::Int(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => QueryParam::Int(i),
                None => n.as_f64().map(QueryParam::Float).unwrap_or(QueryParam::Null),
            },
            Value::String(s) => QueryParam::Text(s.clone()),
            other => QueryParam::Text(other.to_string()),
        }
    }
}

impl From<i64> for QueryParam {
    fn from(n: i64) -> Self {
        QueryParam::Int(n)
    }
}

impl From<f64> for QueryParam {
    fn from(f: f64) -> Self {
        QueryParam::Float(f)
    }
}

impl From<&str> for QueryParam {
    fn from(s: &str) -> Self {
        QueryParam::Text(s.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(s: String) -> Self {
        QueryParam::Text(s)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(QueryParam::Null)
    }
}

/// SQL text plus its bound parameters, ready for a `QueryExecutor`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
    #[serde(skip)]
    pub dialect: Dialect,
}
