//! End-to-end report tests against an in-memory SQLite database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use report_engine::catalog::{FieldCatalog, MemoryCatalog};
use report_engine::exec::{CancelSignal, ExecResult, QueryContext, QueryExecutor, Row, SqliteExecutor};
use report_engine::report::{
    EngineDeps, MemorySavedFilterStore, ReportContext, ReportEngine, ReportEngineFactory,
    ReportError, SqlReportEngine, SqlSavedFilterStore,
};
use report_engine::sql::{CompiledQuery, Dialect};
use serde_json::{json, Value};

const CATALOG: &str = r#"{
  "entities": {
    "orders": {
      "label": "Orders",
      "fields": {
        "status": {"type": "select", "options": {"open": "Open", "closed": "Closed"}},
        "amount": {"type": "currency"},
        "created_at": {"type": "datetime"},
        "paid": {"type": "checkbox"},
        "customer": {"type": "relationship", "entity": "customers"},
        "note": {}
      }
    },
    "customers": {
      "fields": {"name": {}}
    },
    "users": {
      "fields": {"name": {}}
    }
  },
  "protected_entities": ["users"]
}"#;

const SCHEMA: &str = r#"
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    status TEXT,
    amount REAL,
    created_at TEXT,
    paid INTEGER,
    customer INTEGER,
    note TEXT
);
CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE saved_filters (id TEXT PRIMARY KEY, owner TEXT, entity TEXT, definition TEXT);

INSERT INTO customers VALUES (1, 'Acme'), (2, 'Globex');
INSERT INTO orders VALUES
    (1, 'open',   10,  '2024-01-05 09:00:00', 1, 1,    'first'),
    (2, 'open',   20,  '2024-01-20 10:30:00', 0, 1,    ''),
    (3, 'open',   30,  '2024-02-03 12:00:00', 1, 2,    NULL),
    (4, 'closed', 100, '2024-02-10 08:15:00', 1, 2,    'rush'),
    (5, 'closed', 200, '2024-03-01 17:45:00', 0, NULL, 'rush order');
INSERT INTO saved_filters VALUES
    ('large', 'u1', 'orders',
     '{"group": "AND", "filters": [{"field": "amount", "operator": "gte", "value": 150}]}'),
    ('foreign', 'u2', 'orders', '{"status": "open"}');
"#;

fn executor() -> Arc<SqliteExecutor> {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.execute_batch(SCHEMA).unwrap();
    Arc::new(exec)
}

fn engine() -> SqlReportEngine {
    let exec = executor();
    SqlReportEngine::new(
        Arc::new(MemoryCatalog::from_json_str(CATALOG).unwrap()),
        exec.clone(),
        Arc::new(SqlSavedFilterStore::new(exec)),
    )
}

fn user() -> ReportContext {
    ReportContext::for_user("u1")
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_count_by_select_field() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "pie",
                "metric": {"type": "count"},
                "groupBy": {"field": "status"}
            }),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["Open", "Closed"]);
    assert_eq!(result.series.len(), 1);
    assert_eq!(result.series[0].label, "Count");
    assert_eq!(result.series[0].data, vec![3.0, 2.0]);
    assert_eq!(result.meta.total, 5.0);
    assert!(result.meta.warnings.is_empty());
}

#[tokio::test]
async fn test_grouped_query_without_rows_is_empty() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "line",
                "metric": {"type": "sum", "field": "amount"},
                "groupBy": {"field": "created_at", "bucket": "month"},
                "filters": {"status": "archived"}
            }),
            &user(),
        )
        .await
        .unwrap();

    assert!(result.labels.is_empty());
    assert!(result.series[0].data.is_empty());
    assert_eq!(result.meta.total, 0.0);
}

#[tokio::test]
async fn test_non_numeric_comparison_value_binds_zero() {
    let definition = json!({
        "entity": "orders",
        "chartType": "bar",
        "filters": [{"field": "amount", "operator": "gt", "value": "abc"}]
    });
    let engine = engine();

    let outcome = engine.validate(&definition, &user()).await;
    assert!(outcome.valid, "{:?}", outcome.errors);

    let result = engine.run(&definition, &user()).await.unwrap();
    assert_eq!(result.labels, vec!["Total"]);
    assert_eq!(result.series[0].data, vec![5.0]);
}

#[tokio::test]
async fn test_equality_on_numeric_field_is_exact() {
    let exec = executor();
    exec.execute_batch("INSERT INTO orders (id, status, amount) VALUES (6, 'open', 0), (7, 'open', 0);")
        .unwrap();
    let engine = SqlReportEngine::new(
        Arc::new(MemoryCatalog::from_json_str(CATALOG).unwrap()),
        exec.clone(),
        Arc::new(SqlSavedFilterStore::new(exec)),
    );

    let text = engine
        .run(
            &json!({"entity": "orders", "chartType": "pie", "filters": {"amount": "abc"}}),
            &user(),
        )
        .await
        .unwrap();
    assert_eq!(text.series[0].data, vec![0.0]);

    let numeric = engine
        .run(
            &json!({"entity": "orders", "chartType": "pie", "filters": {"amount": "100"}}),
            &user(),
        )
        .await
        .unwrap();
    assert_eq!(numeric.series[0].data, vec![1.0]);
}

#[tokio::test]
async fn test_unknown_filter_field_is_rejected() {
    let outcome = engine()
        .validate(
            &json!({
                "entity": "orders",
                "chartType": "pie",
                "filters": {"field": "unknown_field", "operator": "eq", "value": 1}
            }),
            &user(),
        )
        .await;

    assert!(!outcome.valid);
    assert_eq!(outcome.errors, vec!["Field 'unknown_field' is not allowed"]);
}

#[tokio::test]
async fn test_funnel_without_stages_is_rejected() {
    let outcome = engine()
        .validate(
            &json!({"entity": "orders", "chartType": "funnel", "funnelStages": []}),
            &user(),
        )
        .await;

    assert!(!outcome.valid);
    assert_eq!(outcome.errors, vec!["Funnel charts require at least one stage"]);
}

#[tokio::test]
async fn test_bucket_without_group_field_is_reset() {
    let outcome = engine()
        .validate(
            &json!({
                "entity": "orders",
                "chartType": "bar",
                "groupBy": {"field": null, "bucket": "month"}
            }),
            &user(),
        )
        .await;

    assert!(outcome.valid);
    assert_eq!(
        outcome.warnings,
        vec![
            "Bucket ignored because no group field was selected",
            "Ordering ignored because no group field is selected"
        ]
    );
    assert_eq!(outcome.definition.group_by.bucket, "none");
}

// =============================================================================
// Grouping and labels
// =============================================================================

#[tokio::test]
async fn test_sum_by_month_ordered_by_label() {
    let result = engine()
        .run(
            &json!({"definition": {
                "entity": "orders",
                "chartType": "line",
                "metric": {"type": "SUM", "field": "amount"},
                "groupBy": {"field": "created_at", "bucket": "Month"},
                "order": {"by": "label", "dir": "asc"}
            }}),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["2024-01", "2024-02", "2024-03"]);
    assert_eq!(result.series[0].label, "SUM of amount");
    assert_eq!(result.series[0].data, vec![30.0, 130.0, 200.0]);
    assert_eq!(result.meta.total, 360.0);
}

#[tokio::test]
async fn test_relationship_labels_resolve_names() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "bar",
                "groupBy": {"field": "customer"},
                "order": {"by": "label", "dir": "asc"}
            }),
            &user(),
        )
        .await
        .unwrap();

    // NULL sorts first in SQLite.
    assert_eq!(result.labels, vec!["Unknown", "Acme", "Globex"]);
    assert_eq!(result.series[0].data, vec![1.0, 2.0, 2.0]);
}

#[tokio::test]
async fn test_checkbox_labels() {
    let result = engine()
        .run(
            &json!({"entity": "orders", "chartType": "pie", "groupBy": {"field": "paid"}}),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["True", "False"]);
    assert_eq!(result.series[0].data, vec![3.0, 2.0]);
}

#[tokio::test]
async fn test_limit_applies_to_groups() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "bar",
                "metric": {"type": "max", "field": "amount"},
                "groupBy": {"field": "status"},
                "limit": 1
            }),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["Closed"]);
    assert_eq!(result.series[0].data, vec![200.0]);
}

#[tokio::test]
async fn test_ungrouped_uses_title() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "bar",
                "metric": {"type": "avg", "field": "amount"},
                "title": "Average order"
            }),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["Average order"]);
    assert_eq!(result.series[0].data, vec![72.0]);
}

// =============================================================================
// Filters
// =============================================================================

async fn count_with(filters: Value) -> f64 {
    let result = engine()
        .run(
            &json!({"entity": "orders", "chartType": "bar", "filters": filters}),
            &user(),
        )
        .await
        .unwrap();
    result.series[0].data[0]
}

#[tokio::test]
async fn test_filter_operators() {
    assert_eq!(count_with(json!({"status": "open"})).await, 3.0);
    assert_eq!(
        count_with(json!([{"field": "status", "operator": "in", "value": "closed, archived"}])).await,
        2.0
    );
    assert_eq!(
        count_with(json!([{"field": "created_at", "operator": "gte", "value": "2024-02-01"}])).await,
        3.0
    );
    assert_eq!(
        count_with(json!([{"field": "note", "operator": "contains", "value": "rush"}])).await,
        2.0
    );
    assert_eq!(
        count_with(json!([{"field": "note", "operator": "starts_with", "value": "rush"}])).await,
        2.0
    );
    assert_eq!(
        count_with(json!([{"field": "note", "operator": "empty"}])).await,
        2.0
    );
    assert_eq!(
        count_with(json!([{"field": "note", "operator": "not_empty"}])).await,
        3.0
    );
    assert_eq!(
        count_with(json!([{"field": "paid", "operator": "eq", "value": "yes"}])).await,
        3.0
    );
    assert_eq!(
        count_with(json!([{"field": "paid", "operator": "empty"}])).await,
        2.0
    );
}

#[tokio::test]
async fn test_nested_or_group() {
    let filters = json!({
        "group": "or",
        "filters": [
            {"field": "status", "operator": "eq", "value": "closed"},
            {"group": "and", "filters": [
                {"field": "status", "value": "open"},
                {"field": "amount", "operator": "lt", "value": "15"}
            ]}
        ]
    });
    assert_eq!(count_with(filters).await, 3.0);
}

#[tokio::test]
async fn test_filter_values_are_not_sql() {
    let injected = json!({"status": "open' OR '1'='1"});
    assert_eq!(count_with(injected).await, 0.0);
}

// =============================================================================
// Stored filters and funnels
// =============================================================================

#[tokio::test]
async fn test_stored_filter_resolution() {
    let engine = engine();
    let definition = json!({"entity": "orders", "chartType": "bar", "filterId": "large"});

    let result = engine.run(&definition, &user()).await.unwrap();
    assert_eq!(result.series[0].data, vec![1.0]);

    let err = engine
        .run(&definition, &ReportContext::for_user("u2"))
        .await
        .unwrap_err();
    assert_eq!(
        err.validation().unwrap().errors,
        vec!["Stored filter 'large' not found"]
    );

    let outcome = engine
        .validate(
            &json!({"entity": "orders", "chartType": "bar", "filterId": "foreign"}),
            &user(),
        )
        .await;
    assert_eq!(outcome.errors, vec!["Stored filter 'foreign' not found"]);
}

#[tokio::test]
async fn test_funnel_stages() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "funnel",
                "funnelStages": [
                    {"label": "All orders"},
                    {"label": "Closed", "filters": {"status": "closed"}},
                    {"filter_id": "large"}
                ]
            }),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.labels, vec!["All orders", "Closed", "Stage 3"]);
    assert_eq!(result.series[0].data, vec![5.0, 2.0, 1.0]);
    assert_eq!(result.labels.len(), result.series[0].data.len());
}

#[tokio::test]
async fn test_funnel_stages_are_anded_with_base_filters() {
    let result = engine()
        .run(
            &json!({
                "entity": "orders",
                "chartType": "funnel",
                "metric": {"type": "sum", "field": "amount"},
                "filters": {"status": "open"},
                "funnelStages": [
                    {"label": "Open"},
                    {"label": "Paid", "filters": {"paid": true}}
                ]
            }),
            &user(),
        )
        .await
        .unwrap();

    assert_eq!(result.series[0].data, vec![60.0, 40.0]);
}

// =============================================================================
// Validity and failures
// =============================================================================

#[tokio::test]
async fn test_validate_agrees_with_run() {
    let engine = engine();
    let definitions = [
        json!({"entity": "orders", "chartType": "pie"}),
        json!({"entity": "orders", "chartType": "bar", "groupBy": {"field": "status"}, "limit": 999}),
        json!({"entity": "orders", "chartType": "bar", "metric": {"type": "sum", "field": "note"}}),
        json!({"entity": "users", "chartType": "pie"}),
        json!({"entity": "orders", "chartType": "donut"}),
        json!({"entity": "orders", "chartType": "line", "groupBy": {"field": "status", "bucket": "week"}}),
        json!({"entity": "orders", "chartType": "bar", "filters": [{"field": "status", "operator": "gt", "value": 1}]}),
        json!({"entity": "orders", "chartType": "funnel", "funnelStages": [{"label": "x"}]}),
    ];

    for definition in &definitions {
        let outcome = engine.validate(definition, &user()).await;
        let run = engine.run(definition, &user()).await;
        assert_eq!(outcome.valid, run.is_ok(), "{definition}");
        if let Ok(result) = run {
            for series in &result.series {
                assert_eq!(series.data.len(), result.labels.len());
            }
            assert_eq!(result.meta.warnings, outcome.warnings);
        }
    }
}

#[tokio::test]
async fn test_missing_table_is_an_execution_error() {
    let exec = executor();
    let catalog = MemoryCatalog::from_json_str(
        r#"{"entities": {"invoices": {"fields": {"total": {"type": "number"}}}}}"#,
    )
    .unwrap();
    let engine = SqlReportEngine::new(
        Arc::new(catalog),
        exec,
        Arc::new(MemorySavedFilterStore::new()),
    );

    let err = engine
        .run(&json!({"entity": "invoices", "chartType": "bar"}), &user())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Execution(_)), "{err:?}");
}

#[tokio::test]
async fn test_cancelled_request() {
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();

    let err = engine()
        .run(
            &json!({"entity": "orders", "chartType": "pie", "groupBy": {"field": "status"}}),
            &user().with_cancel(signal),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Cancelled));
}

// =============================================================================
// Generated SQL
// =============================================================================

/// Captures the SQL the engine sends while delegating to SQLite.
struct Capturing {
    inner: Arc<SqliteExecutor>,
    sql: Mutex<Vec<String>>,
}

#[async_trait]
impl QueryExecutor for Capturing {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn fetch_all(&self, query: &CompiledQuery, ctx: &QueryContext) -> ExecResult<Vec<Row>> {
        self.sql.lock().unwrap().push(query.sql.clone());
        self.inner.fetch_all(query, ctx).await
    }
}

#[tokio::test]
async fn test_generated_sql_snapshot() {
    let capturing = Arc::new(Capturing {
        inner: executor(),
        sql: Mutex::new(Vec::new()),
    });
    let catalog: Arc<dyn FieldCatalog> = Arc::new(MemoryCatalog::from_json_str(CATALOG).unwrap());
    let deps = EngineDeps::new(catalog, capturing.clone(), Arc::new(MemorySavedFilterStore::new()));
    let engine = ReportEngineFactory::new().make("sql", deps);

    engine
        .run(
            &json!({
                "entity": "orders",
                "chartType": "bar",
                "metric": {"type": "sum", "field": "amount"},
                "groupBy": {"field": "created_at", "bucket": "month"},
                "filters": {"status": "closed"},
                "order": {"by": "label", "dir": "asc"},
                "limit": 12
            }),
            &user(),
        )
        .await
        .unwrap();

    let sql = capturing.sql.lock().unwrap()[0].clone();
    insta::assert_snapshot!(sql, @r#"
SELECT
  SUM("orders"."amount") AS "value",
  strftime('%Y-%m', "orders"."created_at") AS "label"
FROM "orders"
WHERE ("orders"."status" = ?)
GROUP BY strftime('%Y-%m', "orders"."created_at")
ORDER BY strftime('%Y-%m', "orders"."created_at") ASC
LIMIT 12
"#);
}
