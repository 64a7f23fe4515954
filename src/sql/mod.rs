//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`param`] - Bound parameters and compiled queries
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations and time buckets
//!
//! Request values only ever reach SQL as bound parameters.

pub mod dialect;
pub mod expr;
pub mod param;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Bucket, Dialect, SqlDialect};
pub use expr::{
    and_all, avg, col, count_star, func, lit_int, lit_str, max, min, or_all, param,
    raw_sql, star, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use param::{CompiledQuery, QueryParam};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
