//! SQLite SQL dialect.
//!
//! SQLite is the fallback for any driver name that is not recognized.
//!
//! - ANSI identifier quoting (`"`)
//! - Booleans stored as 1/0
//! - Positional `?` bind parameters
//! - `strftime` for time buckets; `%W` is the Monday-based week of year,
//!   which is the closest SQLite gets to an ISO week without extensions
//! - Quarters computed arithmetically from the month

use super::helpers;
use super::{Bucket, SqlDialect};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn bucket_expr(&self, field: &str, bucket: Bucket) -> String {
        match bucket {
            Bucket::None => field.to_string(),
            Bucket::Day => format!("strftime('%Y-%m-%d', {field})"),
            Bucket::Week => format!("strftime('%Y-W%W', {field})"),
            Bucket::Month => format!("strftime('%Y-%m', {field})"),
            Bucket::Quarter => format!(
                "printf('%04d-Q%d', strftime('%Y', {field}), ((cast(strftime('%m', {field}) as integer) - 1) / 3) + 1)"
            ),
            Bucket::Year => format!("strftime('%Y', {field})"),
        }
    }
}
