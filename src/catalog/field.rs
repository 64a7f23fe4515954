//! Field definitions as seen by the report engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of an entity field.
///
/// Unknown type names are preserved in [`FieldType::Other`] and are not
/// constrained by operator gating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Boolean,
    Checkbox,
    Select,
    Date,
    Datetime,
    Relationship,
    Integer,
    Number,
    Float,
    Decimal,
    Currency,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Checkbox => "checkbox",
            FieldType::Select => "select",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Relationship => "relationship",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Currency => "currency",
            FieldType::Other(name) => name,
        }
    }

    /// boolean / checkbox
    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldType::Boolean | FieldType::Checkbox)
    }

    /// date / datetime
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime)
    }

    /// Types a sum/avg/min/max metric may aggregate.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer
                | FieldType::Number
                | FieldType::Float
                | FieldType::Decimal
                | FieldType::Currency
        )
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "boolean" => FieldType::Boolean,
            "checkbox" => FieldType::Checkbox,
            "select" => FieldType::Select,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "relationship" => FieldType::Relationship,
            "integer" => FieldType::Integer,
            "number" => FieldType::Number,
            "float" => FieldType::Float,
            "decimal" => FieldType::Decimal,
            "currency" => FieldType::Currency,
            _ => FieldType::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of a select field.
///
/// Either a `value -> label` map or a plain list whose positions act as keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOptions {
    Map(serde_json::Map<String, Value>),
    List(Vec<Value>),
}

impl SelectOptions {
    /// Resolve a stored value to its display label.
    ///
    /// A matching key wins; otherwise a value that is itself one of the
    /// labels is returned verbatim.
    pub fn label_for(&self, raw: &str) -> Option<String> {
        match self {
            SelectOptions::Map(map) => {
                if let Some(label) = map.get(raw) {
                    return Some(value_text(label));
                }
                map.values()
                    .any(|v| value_text(v) == raw)
                    .then(|| raw.to_string())
            }
            SelectOptions::List(items) => {
                if let Some(item) = raw.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    return Some(value_text(item));
                }
                items
                    .iter()
                    .any(|v| value_text(v) == raw)
                    .then(|| raw.to_string())
            }
        }
    }
}

/// Definition of a single field of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Declared type; `None` means untyped.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Display label override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Options for select fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SelectOptions>,

    /// Target entity for relationship fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl FieldDef {
    pub fn typed(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    pub fn select(options: SelectOptions) -> Self {
        Self {
            field_type: Some(FieldType::Select),
            options: Some(options),
            ..Default::default()
        }
    }

    pub fn relationship(entity: &str) -> Self {
        Self {
            field_type: Some(FieldType::Relationship),
            entity: Some(entity.to_string()),
            ..Default::default()
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.field_type.as_ref().is_some_and(FieldType::is_boolean)
    }

    pub fn is_temporal(&self) -> bool {
        self.field_type.as_ref().is_some_and(FieldType::is_temporal)
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type.as_ref().is_some_and(FieldType::is_numeric)
    }
}

/// Render a JSON scalar the way it reads in a label.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
