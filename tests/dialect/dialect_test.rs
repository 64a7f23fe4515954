//! Bucket expressions and placeholders across dialects.

use report_engine::exec::{QueryContext, QueryExecutor, SqliteExecutor};
use report_engine::sql::{
    col, count_star, param, raw_sql, table_col, Bucket, Dialect, ExprExt, OrderByExpr, Query,
    SortDir, SqlDialect, TableRef,
};
use serde_json::json;
use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

const DIALECTS: [Dialect; 3] = [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql];

fn parses(sql: &str, dialect: Dialect) -> bool {
    let result = match dialect {
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        Dialect::MySql => Parser::parse_sql(&MySqlDialect {}, sql),
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
    };
    result.is_ok()
}

fn grouped(dialect: Dialect, bucket: Bucket) -> String {
    let column = table_col("orders", "created_at").to_sql(dialect);
    let label = raw_sql(dialect.label_expr(&column, bucket));
    Query::new()
        .select(vec![count_star().alias("value"), label.clone().alias("label")])
        .from(TableRef::new("orders"))
        .filter(col("status").eq(param("open")))
        .group_by(vec![label])
        .order_by(vec![OrderByExpr::new(col("value"), SortDir::Desc)])
        .limit(10)
        .compile(dialect)
        .sql
}

#[test]
fn test_every_bucket_parses_in_every_dialect() {
    for dialect in DIALECTS {
        for bucket in Bucket::ALL {
            let sql = grouped(dialect, bucket);
            assert!(parses(&sql, dialect), "{dialect} {bucket}: {sql}");
        }
    }
}

#[test]
fn test_placeholders() {
    let sql = grouped(Dialect::Postgres, Bucket::None);
    assert!(sql.contains("\"status\" = $1"));

    for dialect in [Dialect::Sqlite, Dialect::MySql] {
        let sql = grouped(dialect, Bucket::None);
        assert!(sql.contains(" = ?"), "{sql}");
        assert!(!sql.contains("open"));
    }
}

#[test]
fn test_driver_fallback() {
    assert_eq!(Dialect::from_driver("mysql"), Dialect::MySql);
    assert_eq!(Dialect::from_driver("postgres"), Dialect::Postgres);
    assert_eq!(Dialect::from_driver("sqlsrv"), Dialect::Sqlite);
}

#[test]
fn test_bucket_names() {
    for bucket in Bucket::ALL {
        assert_eq!(Bucket::parse(bucket.as_str()), Some(bucket));
    }
    assert_eq!(Bucket::parse("hour"), None);
}

#[tokio::test]
async fn test_sqlite_bucket_labels() {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    let value = "'2024-02-10 08:15:00'";
    let expected = [
        (Bucket::None, json!("2024-02-10 08:15:00")),
        (Bucket::Day, json!("2024-02-10")),
        (Bucket::Week, json!("2024-W06")),
        (Bucket::Month, json!("2024-02")),
        (Bucket::Quarter, json!("2024-Q1")),
        (Bucket::Year, json!("2024")),
    ];

    for (bucket, label) in expected {
        let query = Query::new()
            .select(vec![raw_sql(Dialect::Sqlite.bucket_expr(value, bucket)).alias("label")])
            .compile(Dialect::Sqlite);
        let rows = exec.fetch_all(&query, &QueryContext::default()).await.unwrap();
        assert_eq!(rows[0]["label"], label, "{bucket}");
    }
}
