//! Engine selection.
//!
//! Engines are registered by name. The configured name is resolved once
//! when the engine is built; unknown names fall back to the SQL engine.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::engine::ReportEngine;
use super::saved_filter::{SavedFilterStore, SqlSavedFilterStore};
use super::sql_engine::{SqlReportEngine, SQL_ENGINE};
use crate::catalog::{CatalogError, FieldCatalog, MemoryCatalog};
use crate::config::{Settings, SettingsError};
use crate::exec::{ExecError, QueryExecutor, SqliteExecutor};
use crate::sql::Dialect;

/// Errors raised while wiring an engine from settings.
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to load catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to open database: {0}")]
    Exec(#[from] ExecError),

    #[error("no executor available for driver '{0}'")]
    UnsupportedDriver(String),
}

pub type FactoryResult<T> = Result<T, FactoryError>;

/// Shared collaborators handed to every engine constructor.
#[derive(Clone)]
pub struct EngineDeps {
    pub catalog: Arc<dyn FieldCatalog>,
    pub executor: Arc<dyn QueryExecutor>,
    pub saved_filters: Arc<dyn SavedFilterStore>,
}

impl EngineDeps {
    pub fn new(
        catalog: Arc<dyn FieldCatalog>,
        executor: Arc<dyn QueryExecutor>,
        saved_filters: Arc<dyn SavedFilterStore>,
    ) -> Self {
        Self {
            catalog,
            executor,
            saved_filters,
        }
    }

    /// Build the catalog, executor and saved-filter store described by
    /// `settings`.
    ///
    /// Only SQLite databases can be executed. Without a catalog path the
    /// catalog is empty, so every entity is reported as not found.
    pub fn from_settings(settings: &Settings) -> FactoryResult<Self> {
        let catalog = match settings.catalog.resolved_path()? {
            Some(path) => MemoryCatalog::from_file(&path)?,
            None => {
                warn!("no catalog configured; all entities will be unknown");
                MemoryCatalog::new()
            }
        };

        if settings.database.dialect() != Dialect::Sqlite {
            return Err(FactoryError::UnsupportedDriver(settings.database.driver.clone()));
        }
        let executor: Arc<dyn QueryExecutor> = match settings.database.resolved_path()? {
            Some(path) => Arc::new(SqliteExecutor::open(path)),
            None => Arc::new(SqliteExecutor::open_in_memory()?),
        };

        let saved_filters = SqlSavedFilterStore::with_table(executor.clone(), &settings.saved_filters.table);

        Ok(Self::new(Arc::new(catalog), executor, Arc::new(saved_filters)))
    }
}

impl std::fmt::Debug for EngineDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDeps")
            .field("dialect", &self.executor.dialect())
            .field("entities", &self.catalog.entity_names())
            .finish_non_exhaustive()
    }
}

/// Builds an engine from its collaborators.
pub type EngineConstructor = fn(EngineDeps) -> Arc<dyn ReportEngine>;

fn sql_engine(deps: EngineDeps) -> Arc<dyn ReportEngine> {
    Arc::new(SqlReportEngine::new(deps.catalog, deps.executor, deps.saved_filters))
}

/// Name -> constructor map. The `sql` engine is always present.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    constructors: HashMap<String, EngineConstructor>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut constructors: HashMap<String, EngineConstructor> = HashMap::new();
        constructors.insert(SQL_ENGINE.to_string(), sql_engine);
        Self { constructors }
    }

    /// Register (or replace) an engine under `name`.
    pub fn register(&mut self, name: &str, constructor: EngineConstructor) -> &mut Self {
        self.constructors.insert(normalize_name(name), constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&normalize_name(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Option<EngineConstructor> {
        self.constructors.get(name).copied()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolves an engine name against a registry.
#[derive(Debug, Clone, Default)]
pub struct ReportEngineFactory {
    registry: EngineRegistry,
}

impl ReportEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Build the engine registered as `name`, falling back to `sql`.
    pub fn make(&self, name: &str, deps: EngineDeps) -> Arc<dyn ReportEngine> {
        let requested = normalize_name(name);
        let constructor = match self.registry.get(&requested) {
            Some(constructor) => constructor,
            None => {
                warn!(engine = %requested, fallback = SQL_ENGINE, "unknown report engine");
                self.registry.get(SQL_ENGINE).unwrap_or(sql_engine)
            }
        };
        let engine = constructor(deps);
        debug!(engine = engine.name(), "report engine built");
        engine
    }

    /// Build the configured engine and its collaborators.
    pub fn from_settings(&self, settings: &Settings) -> FactoryResult<Arc<dyn ReportEngine>> {
        let deps = EngineDeps::from_settings(settings)?;
        let engine = self.make(&settings.engine.name, deps);
        info!(engine = engine.name(), "report engine ready");
        Ok(engine)
    }
}
