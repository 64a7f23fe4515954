//! Filter normalization, validation and translation through the public API.

use std::collections::BTreeMap;

use report_engine::catalog::{FieldDef, FieldType, MemoryCatalog, FieldCatalog};
use report_engine::filter::{merge_filters, normalize, FilterNode, FilterOperator, FilterTranslator, GroupOp};
use report_engine::sql::{count_star, Dialect, Query, QueryParam, TableRef};
use serde_json::{json, Value};

fn fields() -> BTreeMap<String, FieldDef> {
    let catalog = MemoryCatalog::from_toml_str(
        r#"
[entities.orders.fields.status]
type = "select"
options = { open = "Open", closed = "Closed" }

[entities.orders.fields.amount]
type = "decimal"

[entities.orders.fields.created_at]
type = "datetime"

[entities.orders.fields.closed_on]
type = "date"

[entities.orders.fields.paid]
type = "boolean"

[entities.orders.fields.note]
"#,
    )
    .unwrap();
    catalog.get("orders").unwrap().fields.clone()
}

fn compile(raw: Value, dialect: Dialect) -> (String, Vec<QueryParam>) {
    let fields = fields();
    let translator = FilterTranslator::new(&fields, "orders");
    let node = normalize(&raw).expect("filters normalize");
    assert!(translator.validate(&node).is_empty(), "{:?}", translator.validate(&node));

    let query = Query::new()
        .select(vec![count_star()])
        .from(TableRef::new("orders"));
    let compiled = translator.apply(query, &node).compile(dialect);
    let idx = compiled.sql.find("WHERE ").expect("WHERE clause");
    (compiled.sql[idx + 6..].to_string(), compiled.params)
}

fn errors(raw: Value) -> Vec<String> {
    let fields = fields();
    FilterTranslator::new(&fields, "orders").validate(&normalize(&raw).unwrap())
}

#[test]
fn test_normalize_is_idempotent() {
    let shapes = [
        json!({"status": "open", "amount": 5}),
        json!([{"field": "status", "value": "open"}, {"field": "amount", "operator": "GT", "value": 3}]),
        json!({"group": "or", "filters": [
            {"field": "status", "value": "open"},
            {"group": "and", "filters": {"a": {"field": "amount", "operator": "lt", "value": 9}}}
        ]}),
        json!({"filters": [{"field": "note", "operator": "empty"}]}),
        json!({"field": "status", "operator": "in", "value": ["open", "closed"]}),
        json!({"group": "xor", "filters": [{"field": "status", "value": 1}]}),
    ];

    for raw in shapes {
        let once = normalize(&raw).unwrap();
        let twice = normalize(&once.to_value()).unwrap();
        assert_eq!(once, twice, "{raw}");
    }
}

#[test]
fn test_normalize_drops_malformed_input() {
    assert_eq!(normalize(&json!("status=open")), None);
    assert_eq!(normalize(&json!([])), None);
    assert_eq!(normalize(&json!({"group": "AND", "filters": []})), None);
    assert_eq!(normalize(&json!([{"field": ""}, {"field": "0"}, 7])), None);
}

#[test]
fn test_canonical_shape() {
    let node = normalize(&json!({"status": "open"})).unwrap();
    assert_eq!(
        serde_json::to_value(&node).unwrap(),
        json!({"group": "AND", "filters": [{"field": "status", "operator": "eq", "value": "open"}]})
    );
    assert!(matches!(node, FilterNode::Group { op: GroupOp::And, .. }));
}

#[test]
fn test_validation_messages() {
    assert_eq!(
        errors(json!({"group": "xor", "filters": [{"field": "status", "value": "open"}]})),
        vec!["Filter group 'XOR' is not supported"]
    );
    assert_eq!(
        errors(json!([{"field": "status", "operator": "between", "value": 1}])),
        vec!["Operator 'between' is not supported"]
    );
    assert_eq!(
        errors(json!([{"field": "created_at", "operator": "contains", "value": "2024"}])),
        vec!["Operator 'contains' is not supported for 'created_at' (datetime)"]
    );
    assert_eq!(
        errors(json!([{"field": "amount", "operator": "gt", "value": " "}])),
        vec!["Filter 'amount' requires a value"]
    );
    assert_eq!(
        errors(json!([{"field": "status", "operator": "in", "value": ""}])),
        vec!["Filter 'status' requires a value"]
    );
    assert!(errors(json!([{"field": "note", "operator": "empty"}])).is_empty());
}

#[test]
fn test_allow_list_narrows_fields() {
    let fields = fields();
    let translator =
        FilterTranslator::new(&fields, "orders").with_allowed_fields(vec!["status".to_string()]);
    let node = normalize(&json!({"amount": 1})).unwrap();
    assert_eq!(translator.validate(&node), vec!["Field 'amount' is not allowed"]);
}

#[test]
fn test_operator_parsing() {
    assert_eq!(FilterOperator::parse(" Starts_With "), FilterOperator::StartsWith);
    assert_eq!(
        FilterOperator::parse("between"),
        FilterOperator::Other("between".to_string())
    );
    assert!(!FilterOperator::Empty.needs_value());
    assert!(FilterOperator::In.allowed_for(Some(&FieldType::Select)));
    assert!(!FilterOperator::Gt.allowed_for(Some(&FieldType::Boolean)));
}

#[test]
fn test_translation_binds_every_value() {
    let (sql, params) = compile(
        json!({"group": "OR", "filters": [
            {"field": "status", "operator": "in", "value": "open, closed"},
            {"field": "note", "operator": "ends_with", "value": "'; DROP TABLE orders; --"}
        ]}),
        Dialect::Postgres,
    );

    assert_eq!(
        sql,
        "(\"orders\".\"status\" IN ($1, $2) OR \"orders\".\"note\" LIKE $3)"
    );
    assert_eq!(
        params,
        vec![
            QueryParam::Text("open".into()),
            QueryParam::Text("closed".into()),
            QueryParam::Text("%'; DROP TABLE orders; --".into()),
        ]
    );
}

#[test]
fn test_date_and_boolean_coercion() {
    let (sql, params) = compile(
        json!([
            {"field": "created_at", "operator": "gte", "value": "2024-01-05T10:30"},
            {"field": "closed_on", "operator": "lt", "value": "2024-02-01T00:00:00"},
            {"field": "paid", "value": "off"}
        ]),
        Dialect::MySql,
    );

    assert_eq!(
        sql,
        "(`orders`.`created_at` >= ? AND `orders`.`closed_on` < ? AND `orders`.`paid` = ?)"
    );
    assert_eq!(
        params,
        vec![
            QueryParam::Text("2024-01-05 10:30:00".into()),
            QueryParam::Text("2024-02-01".into()),
            QueryParam::Int(0),
        ]
    );
}

#[test]
fn test_empty_checks_render_without_params() {
    let (sql, params) = compile(
        json!([
            {"field": "note", "operator": "not_empty"},
            {"field": "paid", "operator": "empty"}
        ]),
        Dialect::Sqlite,
    );

    assert_eq!(
        sql,
        "((\"orders\".\"note\" IS NOT NULL AND \"orders\".\"note\" <> '') AND \"orders\".\"paid\" = 0)"
    );
    assert!(params.is_empty());
}

#[test]
fn test_merge_keeps_both_sides() {
    let base = normalize(&json!({"status": "open"}));
    let stage = normalize(&json!({"paid": true}));

    let merged = merge_filters(base.as_ref(), stage.as_ref()).unwrap();
    let (sql, params) = {
        let fields = fields();
        let translator = FilterTranslator::new(&fields, "orders");
        let compiled = translator
            .apply(Query::new().select(vec![count_star()]).from(TableRef::new("orders")), &merged)
            .compile(Dialect::Sqlite);
        (compiled.sql, compiled.params)
    };

    assert!(sql.ends_with("WHERE ((\"orders\".\"status\" = ?) AND (\"orders\".\"paid\" = ?))"));
    assert_eq!(params, vec![QueryParam::Text("open".into()), QueryParam::Int(1)]);
    assert_eq!(merge_filters(None, stage.as_ref()), stage);
    assert_eq!(merge_filters(None, None), None);
}
