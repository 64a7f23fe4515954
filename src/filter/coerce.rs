//! Value coercion applied before a filter value is bound.
//!
//! The rules are deliberately lenient: malformed input never raises, it
//! degrades to a value that binds safely (NULL, `0`, or the input text).

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::catalog::{value_text, FieldType};
use crate::sql::QueryParam;

use super::FilterOperator;

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").expect("valid numeric regex")
});

/// Whether a string reads as a number (leading/trailing whitespace allowed).
pub fn is_numeric(s: &str) -> bool {
    NUMERIC.is_match(s)
}

/// `true|1|yes|y|on` -> 1, `false|0|no|n|off` -> 0, anything else -> `None`.
///
/// JSON integers map zero to 0 and everything else to 1. Floats are not
/// accepted.
pub fn coerce_bool(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().map(|i| i64::from(i != 0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Some(1),
            "false" | "0" | "no" | "n" | "off" => Some(0),
            _ => None,
        },
        _ => None,
    }
}

/// Canonical `YYYY-MM-DD` / `YYYY-MM-DD HH:MM:SS` text for a date value.
///
/// Numbers (and numeric strings) are unix epochs in seconds, or in
/// milliseconds above 1e12, rendered in UTC.
pub fn coerce_date(value: &Value, with_time: bool) -> QueryParam {
    let epoch = match value {
        Value::Null => return QueryParam::Null,
        Value::String(s) if s.is_empty() => return QueryParam::Null,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if is_numeric(s) => s.trim().parse::<f64>().ok(),
        Value::String(s) => return QueryParam::Text(clean_date_text(s, with_time)),
        other => return QueryParam::from_json(other),
    };

    let Some(mut secs) = epoch else {
        return QueryParam::Null;
    };
    if secs > EPOCH_MILLIS_THRESHOLD {
        secs = (secs / 1000.0).floor();
    }
    match DateTime::from_timestamp(secs as i64, 0) {
        Some(dt) if with_time => QueryParam::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Some(dt) => QueryParam::Text(dt.format("%Y-%m-%d").to_string()),
        None => QueryParam::Null,
    }
}

fn clean_date_text(s: &str, with_time: bool) -> String {
    let mut clean = s.replace('T', " ");
    if with_time {
        if clean.len() == 16 {
            clean.push_str(":00");
        }
        clean
    } else {
        clean.chars().take(10).collect()
    }
}

/// Numbers bind as-is, numeric strings are parsed, and any other string
/// binds as `0`.
pub fn coerce_number(value: &Value) -> QueryParam {
    match value {
        Value::String(s) if is_numeric(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(i) => QueryParam::Int(i),
                Err(_) => trimmed
                    .parse::<f64>()
                    .map(QueryParam::Float)
                    .unwrap_or(QueryParam::Int(0)),
            }
        }
        Value::String(s) => {
            debug!(value = %s, "non-numeric filter value coerced to 0");
            QueryParam::Int(0)
        }
        other => QueryParam::from_json(other),
    }
}

/// Coerce a comparison operand according to the field's declared type.
pub fn comparable(value: &Value, field_type: Option<&FieldType>) -> QueryParam {
    match field_type {
        Some(FieldType::Date) => coerce_date(value, false),
        Some(FieldType::Datetime) => coerce_date(value, true),
        Some(t) if t.is_boolean() => coerce_bool(value).into(),
        Some(t) if t.is_numeric() => coerce_number(value),
        _ => QueryParam::from_json(value),
    }
}

/// Operand for `eq`. Dates and booleans are coerced like [`comparable`],
/// numeric fields match the value exactly as given.
pub fn equatable(value: &Value, field_type: Option<&FieldType>) -> QueryParam {
    match field_type {
        Some(t) if t.is_numeric() => QueryParam::from_json(value),
        _ => comparable(value, field_type),
    }
}

/// Operand list for `in`.
///
/// Arrays drop null and empty-string members. Scalars are stringified and
/// comma-split, with blanks removed.
pub fn coerce_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !is_blank(v))
            .cloned()
            .collect(),
        v if is_blank(v) => Vec::new(),
        other => value_text(other)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    }
}

/// LIKE pattern for the string-match operators. `None` means the condition
/// is a no-op.
pub fn like_pattern(operator: &FilterOperator, value: &Value) -> Option<String> {
    if is_blank(value) {
        return None;
    }
    let text = value_text(value);
    match operator {
        FilterOperator::Contains => Some(format!("%{text}%")),
        FilterOperator::StartsWith => Some(format!("{text}%")),
        FilterOperator::EndsWith => Some(format!("%{text}")),
        _ => None,
    }
}

/// Null or the empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("42"));
        assert!(is_numeric(" -1.5 "));
        assert!(is_numeric(".5"));
        assert!(is_numeric("1e3"));
        assert!(!is_numeric("abc"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("1,5"));
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(coerce_bool(&json!(true)), Some(1));
        assert_eq!(coerce_bool(&json!(0)), Some(0));
        assert_eq!(coerce_bool(&json!(7)), Some(1));
        assert_eq!(coerce_bool(&json!(" YES ")), Some(1));
        assert_eq!(coerce_bool(&json!("off")), Some(0));
        assert_eq!(coerce_bool(&json!("maybe")), None);
        assert_eq!(coerce_bool(&json!(1.0)), None);
        assert_eq!(coerce_bool(&json!(null)), None);
    }

    #[test]
    fn test_coerce_date_strings() {
        assert_eq!(
            coerce_date(&json!("2024-03-05T10:20"), true),
            QueryParam::Text("2024-03-05 10:20:00".into())
        );
        assert_eq!(
            coerce_date(&json!("2024-03-05T10:20:30"), false),
            QueryParam::Text("2024-03-05".into())
        );
        assert_eq!(coerce_date(&json!(""), true), QueryParam::Null);
        assert_eq!(coerce_date(&json!(null), false), QueryParam::Null);
    }

    #[test]
    fn test_coerce_date_epochs() {
        assert_eq!(
            coerce_date(&json!(86_400), false),
            QueryParam::Text("1970-01-02".into())
        );
        assert_eq!(
            coerce_date(&json!(1_700_000_000_000_i64), true),
            QueryParam::Text("2023-11-14 22:13:20".into())
        );
        assert_eq!(
            coerce_date(&json!("1700000000"), true),
            QueryParam::Text("2023-11-14 22:13:20".into())
        );
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!("12")), QueryParam::Int(12));
        assert_eq!(coerce_number(&json!("1.5")), QueryParam::Float(1.5));
        assert_eq!(coerce_number(&json!("abc")), QueryParam::Int(0));
        assert_eq!(coerce_number(&json!(3)), QueryParam::Int(3));
    }

    #[test]
    fn test_comparable_by_type() {
        assert_eq!(
            comparable(&json!("yes"), Some(&FieldType::Checkbox)),
            QueryParam::Int(1)
        );
        assert_eq!(
            comparable(&json!("bogus"), Some(&FieldType::Boolean)),
            QueryParam::Null
        );
        assert_eq!(
            comparable(&json!("abc"), Some(&FieldType::Currency)),
            QueryParam::Int(0)
        );
        assert_eq!(
            comparable(&json!("abc"), None),
            QueryParam::Text("abc".into())
        );
    }

    #[test]
    fn test_equatable_keeps_numeric_text() {
        assert_eq!(
            equatable(&json!("abc"), Some(&FieldType::Currency)),
            QueryParam::Text("abc".into())
        );
        assert_eq!(
            equatable(&json!("no"), Some(&FieldType::Checkbox)),
            QueryParam::Int(0)
        );
        assert_eq!(
            equatable(&json!(1706659200), Some(&FieldType::Date)),
            QueryParam::Text("2024-01-31".into())
        );
    }

    #[test]
    fn test_coerce_list() {
        assert_eq!(coerce_list(&json!("a, b,,c ")), vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(coerce_list(&json!([1, null, "", "x"])), vec![json!(1), json!("x")]);
        assert!(coerce_list(&json!("")).is_empty());
        assert!(coerce_list(&json!(null)).is_empty());
        assert_eq!(coerce_list(&json!(5)), vec![json!("5")]);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(
            like_pattern(&FilterOperator::Contains, &json!("ab")),
            Some("%ab%".into())
        );
        assert_eq!(
            like_pattern(&FilterOperator::StartsWith, &json!(12)),
            Some("12%".into())
        );
        assert_eq!(
            like_pattern(&FilterOperator::EndsWith, &json!("z")),
            Some("%z".into())
        );
        assert_eq!(like_pattern(&FilterOperator::Contains, &json!("")), None);
    }
}
