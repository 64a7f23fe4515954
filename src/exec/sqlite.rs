//! SQLite executor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, InterruptHandle, OpenFlags, ToSql};
use serde_json::{Number, Value};
use tracing::{debug, warn};

use super::{ExecError, ExecResult, QueryContext, QueryExecutor, Row};
use crate::sql::{CompiledQuery, Dialect, QueryParam};

#[derive(Debug, Clone)]
enum Source {
    /// Fresh read-only connection per query.
    File(PathBuf),
    /// One connection shared by every query.
    Shared(Arc<Mutex<Connection>>),
}

/// Executes queries with rusqlite on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    source: Source,
}

impl SqliteExecutor {
    /// Open a database file per query.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    /// A private in-memory database (for testing and embedding).
    pub fn open_in_memory() -> ExecResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Share an existing connection between queries.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            source: Source::Shared(Arc::new(Mutex::new(conn))),
        }
    }

    /// Run statements outside the report path (schema setup, seeding).
    pub fn execute_batch(&self, sql: &str) -> ExecResult<()> {
        match &self.source {
            Source::File(path) => Connection::open(path)?.execute_batch(sql)?,
            Source::Shared(conn) => conn.lock().map_err(|_| ExecError::Poisoned)?.execute_batch(sql)?,
        }
        Ok(())
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_all(&self, query: &CompiledQuery, ctx: &QueryContext) -> ExecResult<Vec<Row>> {
        if ctx.cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        debug!(sql = %query.sql, params = query.params.len(), "executing query");

        let statement = Arc::new(Statement::default());

        let task = {
            let source = self.source.clone();
            let sql = query.sql.clone();
            let params = query.params.clone();
            let statement = Arc::clone(&statement);
            tokio::task::spawn_blocking(move || {
                with_connection(&source, |conn| {
                    if !statement.start(conn.get_interrupt_handle()) {
                        return Err(ExecError::Cancelled);
                    }
                    let rows = fetch_rows(conn, &sql, &params);
                    statement.finish();
                    rows
                })
            })
        };

        let run = async {
            tokio::select! {
                joined = task => joined.unwrap_or_else(|e| Err(ExecError::Join(e))),
                _ = ctx.cancel.cancelled() => Err(ExecError::Cancelled),
            }
        };

        let result = match tokio::time::timeout(ctx.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout(ctx.timeout)),
        };

        if let Err(e) = &result {
            if e.is_interrupted() {
                let interrupted = statement.abort();
                warn!(error = %e, interrupted, "query aborted");
            }
        }
        result
    }
}

/// Interrupt bookkeeping for one query.
///
/// The connection is only interrupted while this query's statement holds
/// it. `finish` runs before the connection is released, so a late abort
/// cannot reach a statement from another request.
#[derive(Default)]
struct Statement {
    phase: Mutex<Phase>,
}

#[derive(Default)]
enum Phase {
    #[default]
    Pending,
    Running(InterruptHandle),
    Finished,
    Aborted,
}

impl Statement {
    /// Returns `false` if the query was aborted before it got the connection.
    fn start(&self, handle: InterruptHandle) -> bool {
        let Ok(mut phase) = self.phase.lock() else {
            return false;
        };
        if matches!(*phase, Phase::Aborted) {
            return false;
        }
        *phase = Phase::Running(handle);
        true
    }

    fn finish(&self) {
        if let Ok(mut phase) = self.phase.lock() {
            if matches!(*phase, Phase::Running(_)) {
                *phase = Phase::Finished;
            }
        }
    }

    /// Returns whether a running statement was interrupted.
    fn abort(&self) -> bool {
        let Ok(mut phase) = self.phase.lock() else {
            return false;
        };
        match std::mem::replace(&mut *phase, Phase::Aborted) {
            Phase::Running(handle) => {
                handle.interrupt();
                true
            }
            Phase::Finished => {
                *phase = Phase::Finished;
                false
            }
            Phase::Pending | Phase::Aborted => false,
        }
    }
}

fn with_connection<T>(
    source: &Source,
    f: impl FnOnce(&Connection) -> ExecResult<T>,
) -> ExecResult<T> {
    match source {
        Source::File(path) => {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            f(&conn)
        }
        Source::Shared(conn) => {
            let guard = conn.lock().map_err(|_| ExecError::Poisoned)?;
            f(&guard)
        }
    }
}

fn fetch_rows(conn: &Connection, sql: &str, params: &[QueryParam]) -> ExecResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        out.push(record);
    }
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl ToSql for QueryParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryParam::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            QueryParam::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            QueryParam::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            QueryParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}
