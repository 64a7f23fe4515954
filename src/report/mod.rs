//! Report definitions, validation and execution.
//!
//! A report request is a JSON definition (entity, chart type, metric,
//! grouping, filters, funnel stages). A [`ReportEngine`] validates it
//! against the [`FieldCatalog`](crate::catalog::FieldCatalog) and, when
//! valid, executes it and shapes the rows into a chart-ready
//! [`ReportResult`].
//!
//! ```text
//! raw JSON ─▶ NormalizedDefinition ─▶ validate ─▶ ReportDefinition
//!                                         │
//!                        filters ◀────────┘ (inline or stored)
//!                           │
//!                           ▼
//!                  Query ─▶ CompiledQuery ─▶ QueryExecutor ─▶ ReportResult
//! ```
//!
//! Engines are selected by name through [`ReportEngineFactory`].

mod context;
mod definition;
mod engine;
mod error;
mod factory;
mod format;
mod result;
pub mod saved_filter;
mod sql_engine;

pub use context::ReportContext;
pub use definition::{
    unwrap_payload, ChartType, FunnelStage, GroupBy, GroupBySpec, Metric, MetricSpec, MetricType,
    NormalizedDefinition, OrderBy, OrderSpec, ReportDefinition, StageSpec, MAX_LIMIT,
};
pub use engine::ReportEngine;
pub use error::{ReportError, ReportValidationError};
pub use factory::{
    EngineConstructor, EngineDeps, EngineRegistry, FactoryError, FactoryResult, ReportEngineFactory,
};
pub use format::{group_label, metric_value};
pub use result::{ReportMeta, ReportResult, Series, ValidationOutcome};
pub use saved_filter::{
    MemorySavedFilterStore, SavedFilter, SavedFilterStore, SqlSavedFilterStore, StoreError,
    StoreResult, DEFAULT_SAVED_FILTERS_TABLE,
};
pub use sql_engine::{SqlReportEngine, SQL_ENGINE};
