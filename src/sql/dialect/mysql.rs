//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - Positional `?` bind parameters
//! - `date_format` for time buckets; `%x-W%v` gives the ISO year and week

use super::helpers;
use super::{Bucket, SqlDialect};

/// MySQL SQL dialect (also used for MariaDB).
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn bucket_expr(&self, field: &str, bucket: Bucket) -> String {
        match bucket {
            Bucket::None => field.to_string(),
            Bucket::Day => format!("date_format({field}, '%Y-%m-%d')"),
            Bucket::Week => format!("date_format({field}, '%x-W%v')"),
            Bucket::Month => format!("date_format({field}, '%Y-%m')"),
            Bucket::Quarter => format!("concat(year({field}), '-Q', quarter({field}))"),
            Bucket::Year => format!("date_format({field}, '%Y')"),
        }
    }
}
