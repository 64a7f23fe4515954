//! The report engine interface.

use async_trait::async_trait;
use serde_json::Value;

use super::context::ReportContext;
use super::error::ReportError;
use super::result::{ReportResult, ValidationOutcome};

/// Validates and runs report definitions.
///
/// Both methods take the raw request definition (optionally wrapped under
/// `definition` / `reportDefinition`). Implementations hold no per-request
/// state and may be shared across tasks.
#[async_trait]
pub trait ReportEngine: Send + Sync {
    /// Registry name of this engine.
    fn name(&self) -> &str;

    /// Check a definition without executing it. Never fails; problems are
    /// reported in the outcome.
    async fn validate(&self, definition: &Value, ctx: &ReportContext) -> ValidationOutcome;

    /// Validate and execute a definition.
    ///
    /// Returns [`ReportError::Validation`] with the same errors `validate`
    /// would report when the definition is invalid.
    async fn run(&self, definition: &Value, ctx: &ReportContext) -> Result<ReportResult, ReportError>;
}
