//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - Numbered bind parameters (`$1`, `$2`, ...)
//! - `date_trunc` + `to_char` for time buckets (ISO weeks via `IYYY`/`IW`)

use super::helpers;
use super::{Bucket, SqlDialect};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_numbered(index)
    }

    fn bucket_expr(&self, field: &str, bucket: Bucket) -> String {
        match bucket {
            Bucket::None => field.to_string(),
            Bucket::Day => format!("to_char(date_trunc('day', {field}), 'YYYY-MM-DD')"),
            Bucket::Week => format!("to_char(date_trunc('week', {field}), 'IYYY-\"W\"IW')"),
            Bucket::Month => format!("to_char(date_trunc('month', {field}), 'YYYY-MM')"),
            Bucket::Quarter => {
                format!("to_char(date_trunc('quarter', {field}), 'YYYY-\"Q\"Q')")
            }
            Bucket::Year => format!("to_char(date_trunc('year', {field}), 'YYYY')"),
        }
    }
}
