//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (PG/SQLite), `` ` `` (MySQL)
//! - Boolean literals: true/false vs 1/0
//! - Bind placeholders: `$n` vs `?`
//! - Time bucket expressions for grouped reports
//!
//! # Usage
//!
//! ```ignore
//! use report_engine::dialect::{Bucket, Dialect, SqlDialect};
//!
//! let dialect = Dialect::from_driver("pgsql");
//! let month = dialect.bucket_expr("\"orders\".\"created_at\"", Bucket::Month);
//! ```
//!
//! # Driver names
//!
//! | Driver string                     | Dialect  |
//! |-----------------------------------|----------|
//! | `pgsql`, `postgres`, `postgresql` | Postgres |
//! | `mysql`, `mariadb`                | MySql    |
//! | anything else                     | Sqlite   |

mod bucket;
pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;

pub use bucket::Bucket;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - PostgreSQL/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    ///
    /// - PostgreSQL: `true`/`false`
    /// - MySQL/SQLite: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Bind Parameters
    // =========================================================================

    /// Placeholder for the `index`-th bound parameter (1-based).
    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_positional(index)
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    // =========================================================================
    // Time Buckets
    // =========================================================================

    /// Wrap an already-quoted column expression in this dialect's bucket
    /// formatting. `Bucket::None` returns the expression unchanged.
    fn bucket_expr(&self, field: &str, bucket: Bucket) -> String;

    /// Expression used for the group-label column. Same as [`bucket_expr`].
    ///
    /// [`bucket_expr`]: SqlDialect::bucket_expr
    fn label_expr(&self, field: &str, bucket: Bucket) -> String {
        self.bucket_expr(field, bucket)
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
        }
    }

    /// Map a database driver name onto a dialect.
    ///
    /// Unrecognized drivers fall back to SQLite.
    pub fn from_driver(driver: &str) -> Self {
        match driver.trim().to_lowercase().as_str() {
            "pgsql" | "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            _ => Dialect::Sqlite,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn bucket_expr(&self, field: &str, bucket: Bucket) -> String {
        self.dialect().bucket_expr(field, bucket)
    }

    fn label_expr(&self, field: &str, bucket: Bucket) -> String {
        self.dialect().label_expr(field, bucket)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

/// Bucket expression for a driver name, falling back to SQLite for unknown drivers.
pub fn bucket_expr(driver: &str, field: &str, bucket: Bucket) -> String {
    Dialect::from_driver(driver).bucket_expr(field, bucket)
}

/// Group-label expression for a driver name. Alias of [`bucket_expr`].
pub fn label_expr(driver: &str, field: &str, bucket: Bucket) -> String {
    Dialect::from_driver(driver).label_expr(field, bucket)
}
