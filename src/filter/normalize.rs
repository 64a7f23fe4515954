//! Loose JSON -> canonical [`FilterNode`] tree.

use serde_json::{Map, Value};

use crate::catalog::value_text;

use super::{FilterCondition, FilterNode, FilterOperator, GroupOp};

/// Normalize filter input into a canonical tree.
///
/// Accepted shapes:
/// - `{"group": "AND", "filters": [...]}` - nested tree
/// - `{"filters": [...]}` - tree without an explicit group (AND)
/// - `{"field": "...", "operator": "...", "value": ...}` - a single condition
/// - `{"status": "open", "region": "eu"}` - field map, each entry an `eq`
/// - `[{...}, {...}]` - list of conditions and/or groups (AND)
///
/// Malformed children are dropped. Returns `None` when nothing survives.
pub fn normalize(raw: &Value) -> Option<FilterNode> {
    match raw {
        Value::Object(map) => normalize_object(map),
        Value::Array(items) => group(GroupOp::And, items.iter()),
        _ => None,
    }
}

fn normalize_object(map: &Map<String, Value>) -> Option<FilterNode> {
    match (map.get("group"), map.get("filters")) {
        (Some(op), Some(children)) => {
            let op = GroupOp::parse(&value_text(op));
            match children {
                Value::Array(items) => group(op, items.iter()),
                Value::Object(items) => group(op, items.values()),
                _ => None,
            }
        }
        (None, Some(children)) => normalize(children),
        _ if map.contains_key("field") => {
            condition(map).map(|c| FilterNode::and(vec![FilterNode::Condition(c)]))
        }
        _ => {
            let children: Vec<FilterNode> = map
                .iter()
                .filter(|(field, _)| is_field_name(field))
                .map(|(field, value)| {
                    FilterNode::condition(field, FilterOperator::Eq, value.clone())
                })
                .collect();
            (!children.is_empty()).then(|| FilterNode::and(children))
        }
    }
}

fn group<'a>(op: GroupOp, items: impl Iterator<Item = &'a Value>) -> Option<FilterNode> {
    let children: Vec<FilterNode> = items.filter_map(child).collect();
    if children.is_empty() {
        return None;
    }
    Some(FilterNode::Group { op, children })
}

fn child(raw: &Value) -> Option<FilterNode> {
    let map = raw.as_object()?;
    if map.contains_key("group") && map.contains_key("filters") {
        return normalize_object(map);
    }
    condition(map).map(FilterNode::Condition)
}

fn is_field_name(field: &str) -> bool {
    !field.is_empty() && field != "0"
}

fn condition(map: &Map<String, Value>) -> Option<FilterCondition> {
    let field = map.get("field").map(value_text).unwrap_or_default();
    if !is_field_name(&field) {
        return None;
    }
    let operator = match map.get("operator") {
        None | Some(Value::Null) => FilterOperator::Eq,
        Some(op) => FilterOperator::parse(&value_text(op)),
    };
    Some(FilterCondition {
        field,
        operator,
        value: map.get("value").cloned().unwrap_or(Value::Null),
    })
}

/// Combine report-wide filters with extra (stage) filters.
///
/// Either side may be absent. When both are present they become the two
/// children of a new AND group; neither input is modified.
pub fn merge_filters(base: Option<&FilterNode>, extra: Option<&FilterNode>) -> Option<FilterNode> {
    match (base, extra) {
        (None, None) => None,
        (Some(node), None) | (None, Some(node)) => Some(node.clone()),
        (Some(base), Some(extra)) => Some(FilterNode::and(vec![base.clone(), extra.clone()])),
    }
}
