//! # Report Engine
//!
//! Validates chart report definitions against entity metadata and runs them
//! as safe, parameterized SQL aggregates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Report Definition (JSON)                    │
//! │  (entity, chart type, metric, groupBy, filters, stages)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [report: normalize + validate]
//! ┌─────────────────────────────────────────────────────────┐
//! │      ReportDefinition  +  FilterNode tree                │
//! │      (checked against the FieldCatalog)                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [filter translator, sql builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │      CompiledQuery (SQL text + bound parameters)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [exec: deadline + cancellation]
//! ┌─────────────────────────────────────────────────────────┐
//! │      ReportResult {labels, series, meta}                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod exec;
pub mod filter;
pub mod logging;
pub mod report;
pub mod sql;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{EntityMeta, FieldCatalog, FieldDef, FieldType, MemoryCatalog};
    pub use crate::dialect::{Bucket, Dialect, SqlDialect};
    pub use crate::exec::{CancelHandle, CancelSignal, QueryExecutor, SqliteExecutor};
    pub use crate::filter::{normalize, FilterNode, FilterOperator, FilterTranslator, GroupOp};
    pub use crate::report::{
        EngineDeps, ReportContext, ReportEngine, ReportEngineFactory, ReportError, ReportResult,
        SavedFilterStore, SqlReportEngine, ValidationOutcome,
    };
    pub use crate::sql::{CompiledQuery, QueryParam};
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use report::{ReportContext, ReportEngine, ReportEngineFactory, ReportError, SqlReportEngine};
