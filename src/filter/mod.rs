//! Filter expression trees.
//!
//! Request filters arrive in several loose shapes (a `field -> value` map, a
//! flat list of conditions, or a nested `{group, filters}` tree). They are
//! normalized into a [`FilterNode`], validated against the entity's fields,
//! and compiled into a bound-parameter predicate.
//!
//! - [`normalize`] - loose JSON -> `FilterNode`
//! - [`coerce`] - per-field-type value coercion
//! - [`translator`] - validation and predicate compilation

pub mod coerce;
mod normalize;
mod translator;

pub use normalize::{merge_filters, normalize};
pub use translator::FilterTranslator;

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::catalog::FieldType;

/// Logical operator joining the children of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOp {
    And,
    Or,
    /// Anything else; kept so validation can report it.
    Other(String),
}

impl GroupOp {
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "AND" => GroupOp::And,
            "OR" => GroupOp::Or,
            other => GroupOp::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GroupOp::And => "AND",
            GroupOp::Or => "OR",
            GroupOp::Other(s) => s,
        }
    }
}

/// Condition operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Contains,
    StartsWith,
    EndsWith,
    NotEmpty,
    Empty,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    /// Unsupported operator name (lower-cased); rejected by validation.
    Other(String),
}

impl FilterOperator {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "eq" => FilterOperator::Eq,
            "contains" => FilterOperator::Contains,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "not_empty" => FilterOperator::NotEmpty,
            "empty" => FilterOperator::Empty,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            "in" => FilterOperator::In,
            other => FilterOperator::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::NotEmpty => "not_empty",
            FilterOperator::Empty => "empty",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Other(s) => s,
        }
    }

    /// `not_empty` and `empty` take no value.
    pub fn needs_value(&self) -> bool {
        !matches!(self, FilterOperator::NotEmpty | FilterOperator::Empty)
    }

    /// Whether this operator may be used on a field of the given type.
    ///
    /// | field type          | legal operators                  |
    /// |---------------------|----------------------------------|
    /// | boolean / checkbox  | eq                               |
    /// | select              | eq, in, not_empty                |
    /// | date / datetime     | eq, gt, gte, lt, lte, not_empty  |
    /// | relationship        | eq, in, not_empty                |
    ///
    /// `empty` is legal everywhere. Untyped fields and types not in the
    /// table accept every operator.
    pub fn allowed_for(&self, field_type: Option<&FieldType>) -> bool {
        use FilterOperator::*;

        if matches!(self, Empty) {
            return true;
        }
        let Some(field_type) = field_type else {
            return true;
        };
        match field_type {
            FieldType::Boolean | FieldType::Checkbox => matches!(self, Eq),
            FieldType::Select | FieldType::Relationship => matches!(self, Eq | In | NotEmpty),
            FieldType::Date | FieldType::Datetime => {
                matches!(self, Eq | Gt | Gte | Lt | Lte | NotEmpty)
            }
            _ => true,
        }
    }
}

/// A single `field operator value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Canonical filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Group {
        op: GroupOp,
        children: Vec<FilterNode>,
    },
    Condition(FilterCondition),
}

impl FilterNode {
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Group {
            op: GroupOp::And,
            children,
        }
    }

    pub fn condition(field: &str, operator: FilterOperator, value: Value) -> Self {
        FilterNode::Condition(FilterCondition {
            field: field.to_string(),
            operator,
            value,
        })
    }

    /// Canonical JSON form; feeding it back through [`normalize`] yields
    /// the same tree.
    pub fn to_value(&self) -> Value {
        match self {
            FilterNode::Group { op, children } => json!({
                "group": op.as_str(),
                "filters": children.iter().map(FilterNode::to_value).collect::<Vec<_>>(),
            }),
            FilterNode::Condition(c) => json!({
                "field": c.field,
                "operator": c.operator.as_str(),
                "value": c.value,
            }),
        }
    }
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
