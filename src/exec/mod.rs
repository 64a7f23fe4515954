//! Query execution.
//!
//! The report engine never talks to a driver directly. It compiles a
//! [`CompiledQuery`] and hands it to a [`QueryExecutor`] together with a
//! [`QueryContext`] carrying the per-query deadline and the request's
//! cancellation signal.
//!
//! - [`SqliteExecutor`] - rusqlite-backed executor (file or in-memory)

mod cancel;
mod error;
mod sqlite;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{ExecError, ExecResult};
pub use sqlite::SqliteExecutor;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::sql::{CompiledQuery, Dialect};

/// Default per-query deadline (30 seconds).
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// One result row: column name -> value.
pub type Row = serde_json::Map<String, Value>;

/// Deadline and cancellation for a single query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub timeout: Duration,
    pub cancel: CancelSignal,
}

impl QueryContext {
    pub fn new(timeout: Duration, cancel: CancelSignal) -> Self {
        Self { timeout, cancel }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_QUERY_TIMEOUT,
            cancel: CancelSignal::never(),
        }
    }
}

/// Runs read-only queries against a relational store.
///
/// Implementations must honour the context: a query that outlives
/// `ctx.timeout` fails with [`ExecError::Timeout`], and one whose signal
/// fires fails with [`ExecError::Cancelled`]. Both abort the in-flight
/// statement where the driver allows it.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Dialect queries must be compiled for.
    fn dialect(&self) -> Dialect;

    /// Run a query and return every row.
    async fn fetch_all(&self, query: &CompiledQuery, ctx: &QueryContext) -> ExecResult<Vec<Row>>;
}
