//! Filter validation and predicate compilation.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::catalog::{FieldDef, FieldType};
use crate::sql::{and_all, lit_int, lit_str, or_all, param, table_col, Expr, ExprExt, Query, QueryParam};

use super::coerce::{coerce_list, comparable, equatable, like_pattern};
use super::{FilterCondition, FilterNode, FilterOperator, GroupOp};

/// Validates filter trees against an entity's fields and compiles them
/// into predicates on that entity's table.
#[derive(Debug, Clone)]
pub struct FilterTranslator<'a> {
    fields: &'a BTreeMap<String, FieldDef>,
    table: &'a str,
    allowed: Option<HashSet<String>>,
}

impl<'a> FilterTranslator<'a> {
    /// Every field of the entity is filterable.
    pub fn new(fields: &'a BTreeMap<String, FieldDef>, table: &'a str) -> Self {
        Self {
            fields,
            table,
            allowed: None,
        }
    }

    /// Restrict filterable fields to `allowed`. An empty list keeps the
    /// default (all fields).
    pub fn with_allowed_fields(mut self, allowed: impl IntoIterator<Item = String>) -> Self {
        let allowed: HashSet<String> = allowed.into_iter().collect();
        self.allowed = (!allowed.is_empty()).then_some(allowed);
        self
    }

    fn is_allowed(&self, field: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.contains(field),
            None => self.fields.contains_key(field),
        }
    }

    fn field_type(&self, field: &str) -> Option<&FieldType> {
        self.fields.get(field).and_then(|def| def.field_type.as_ref())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Collect every problem in the tree. An empty list means the tree can
    /// be applied.
    pub fn validate(&self, node: &FilterNode) -> Vec<String> {
        let mut errors = Vec::new();
        match node {
            FilterNode::Group { op, children } => self.validate_group(op, children, &mut errors),
            FilterNode::Condition(_) => self.validate_node(node, &mut errors),
        }
        errors
    }

    fn validate_group(&self, op: &GroupOp, children: &[FilterNode], errors: &mut Vec<String>) {
        if let GroupOp::Other(name) = op {
            errors.push(format!("Filter group '{name}' is not supported"));
            return;
        }
        if children.is_empty() {
            errors.push("No filters provided".to_string());
            return;
        }
        for child in children {
            self.validate_node(child, errors);
        }
    }

    fn validate_node(&self, node: &FilterNode, errors: &mut Vec<String>) {
        match node {
            FilterNode::Group { op, children } => self.validate_group(op, children, errors),
            FilterNode::Condition(cond) => {
                if let Some(error) = self.validate_condition(cond) {
                    errors.push(error);
                }
            }
        }
    }

    fn validate_condition(&self, cond: &FilterCondition) -> Option<String> {
        let field = cond.field.as_str();
        if !self.is_allowed(field) {
            return Some(format!("Field '{field}' is not allowed"));
        }

        if let FilterOperator::Other(op) = &cond.operator {
            return Some(format!("Operator '{op}' is not supported"));
        }

        let field_type = self.field_type(field);
        if !cond.operator.allowed_for(field_type) {
            return Some(format!(
                "Operator '{}' is not supported for '{field}' ({})",
                cond.operator.as_str(),
                field_type.map(FieldType::as_str).unwrap_or_default()
            ));
        }

        if cond.operator.needs_value() {
            let blank = match &cond.value {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                _ => false,
            };
            if blank {
                return Some(format!("Filter '{field}' requires a value"));
            }
            if cond.operator == FilterOperator::In && coerce_list(&cond.value).is_empty() {
                return Some(format!("Filter '{field}' requires a list of values"));
            }
        }

        None
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Compile a validated tree into a single predicate.
    ///
    /// Groups render parenthesized. Returns `None` when every condition is
    /// a no-op (e.g. `contains` with an empty value).
    pub fn to_predicate(&self, node: &FilterNode) -> Option<Expr> {
        match node {
            FilterNode::Group { op, children } => {
                let parts = children.iter().filter_map(|c| self.to_predicate(c));
                let joined = match op {
                    GroupOp::Or => or_all(parts),
                    GroupOp::And | GroupOp::Other(_) => and_all(parts),
                }?;
                Some(joined.paren())
            }
            FilterNode::Condition(cond) => self.condition_predicate(cond),
        }
    }

    fn condition_predicate(&self, cond: &FilterCondition) -> Option<Expr> {
        let column = table_col(self.table, &cond.field);
        let field_type = self.field_type(&cond.field);
        let is_boolean = field_type.is_some_and(FieldType::is_boolean);

        let expr = match &cond.operator {
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                let pattern = like_pattern(&cond.operator, &cond.value)?;
                column.like(param(pattern))
            }
            FilterOperator::In => {
                let values = coerce_list(&cond.value)
                    .iter()
                    .map(|v| Expr::Param(QueryParam::from_json(v)))
                    .collect();
                column.in_list(values)
            }
            FilterOperator::Gt => column.gt(comparable(&cond.value, field_type)),
            FilterOperator::Gte => column.gte(comparable(&cond.value, field_type)),
            FilterOperator::Lt => column.lt(comparable(&cond.value, field_type)),
            FilterOperator::Lte => column.lte(comparable(&cond.value, field_type)),
            FilterOperator::NotEmpty if is_boolean => column.eq(lit_int(1)),
            FilterOperator::NotEmpty => column
                .clone()
                .is_not_null()
                .and(column.ne(lit_str("")))
                .paren(),
            FilterOperator::Empty if is_boolean => column.eq(lit_int(0)),
            FilterOperator::Empty => column.clone().is_null().or(column.eq(lit_str(""))).paren(),
            FilterOperator::Eq | FilterOperator::Other(_) => {
                column.eq(equatable(&cond.value, field_type))
            }
        };
        Some(expr)
    }

    /// AND the compiled tree into the query's WHERE clause.
    pub fn apply(&self, query: Query, node: &FilterNode) -> Query {
        match self.to_predicate(node) {
            Some(predicate) => query.filter(predicate),
            None => query,
        }
    }
}
