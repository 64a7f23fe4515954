//! Stored filter definitions referenced by `filterId`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::value_text;
use crate::exec::{ExecError, QueryContext, QueryExecutor};
use crate::sql::{col, param, ExprExt, Query, TableRef};

/// Default table holding stored filters.
pub const DEFAULT_SAVED_FILTERS_TABLE: &str = "saved_filters";

/// Errors raised by a [`SavedFilterStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to load stored filter: {0}")]
    Exec(#[from] ExecError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted, user-owned filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub owner: String,
    pub entity: String,
    /// Filter tree, either as a JSON value or as JSON text.
    pub definition: Value,
}

impl SavedFilter {
    pub fn new(owner: &str, entity: &str, definition: Value) -> Self {
        Self {
            owner: owner.to_string(),
            entity: entity.to_string(),
            definition,
        }
    }

    /// Decoded definition. JSON text is parsed; text that does not parse
    /// is returned unchanged.
    pub fn decoded_definition(&self) -> Value {
        match &self.definition {
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| self.definition.clone()),
            other => other.clone(),
        }
    }
}

/// Lookup of stored filters by id.
#[async_trait]
pub trait SavedFilterStore: Send + Sync {
    /// `Ok(None)` when no record has this id.
    async fn get(&self, id: &str, ctx: &QueryContext) -> StoreResult<Option<SavedFilter>>;
}

/// In-memory store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySavedFilterStore {
    filters: HashMap<String, SavedFilter>,
}

impl MemorySavedFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, id: &str, filter: SavedFilter) -> Self {
        self.filters.insert(id.to_string(), filter);
        self
    }
}

#[async_trait]
impl SavedFilterStore for MemorySavedFilterStore {
    async fn get(&self, id: &str, _ctx: &QueryContext) -> StoreResult<Option<SavedFilter>> {
        Ok(self.filters.get(id).cloned())
    }
}

/// Reads `owner`, `entity` and `definition` from a table through any
/// [`QueryExecutor`].
#[derive(Clone)]
pub struct SqlSavedFilterStore {
    executor: Arc<dyn QueryExecutor>,
    table: String,
}

impl SqlSavedFilterStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_table(executor, DEFAULT_SAVED_FILTERS_TABLE)
    }

    pub fn with_table(executor: Arc<dyn QueryExecutor>, table: &str) -> Self {
        Self {
            executor,
            table: table.to_string(),
        }
    }

    fn lookup(&self, id: &str) -> Query {
        Query::new()
            .select(vec![col("owner"), col("entity"), col("definition")])
            .from(TableRef::new(&self.table))
            .filter(col("id").eq(param(id)))
            .limit(1)
    }
}

impl std::fmt::Debug for SqlSavedFilterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSavedFilterStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SavedFilterStore for SqlSavedFilterStore {
    async fn get(&self, id: &str, ctx: &QueryContext) -> StoreResult<Option<SavedFilter>> {
        let compiled = self.lookup(id).compile(self.executor.dialect());
        let rows = self.executor.fetch_all(&compiled, ctx).await?;
        Ok(rows.into_iter().next().map(|row| SavedFilter {
            owner: row.get("owner").map(value_text).unwrap_or_default(),
            entity: row.get("entity").map(value_text).unwrap_or_default(),
            definition: row.get("definition").cloned().unwrap_or(Value::Null),
        }))
    }
}
