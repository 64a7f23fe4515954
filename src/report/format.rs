//! Row value formatting for report output.

use serde_json::Value;

use crate::catalog::{value_text, FieldDef, FieldType};
use crate::filter::coerce::is_numeric;

/// Display label for a group value.
///
/// Null and empty values read `Unknown`. Select fields map option keys to
/// their labels; boolean fields render `True`/`False`.
pub fn group_label(value: Option<&Value>, field: Option<&FieldDef>) -> String {
    let raw = match value {
        None | Some(Value::Null) => return "Unknown".to_string(),
        Some(v) => value_text(v),
    };
    if raw.is_empty() {
        return "Unknown".to_string();
    }

    let Some(field) = field else {
        return raw;
    };

    if field.field_type == Some(FieldType::Select) {
        if let Some(label) = field.options.as_ref().and_then(|o| o.label_for(&raw)) {
            return label;
        }
    }

    if field.is_boolean() {
        match raw.to_lowercase().as_str() {
            "1" | "true" => return "True".to_string(),
            "0" | "false" => return "False".to_string(),
            _ => {}
        }
    }

    raw
}

/// Numeric metric value; anything non-numeric counts as zero.
pub fn metric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if is_numeric(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
