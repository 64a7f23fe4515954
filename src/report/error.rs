//! Report errors.

use std::time::Duration;

use thiserror::Error;

use super::definition::NormalizedDefinition;
use crate::exec::ExecError;

/// A definition that failed validation.
///
/// Carries every error found, the non-fatal warnings, and the
/// best-effort normalized definition.
#[derive(Error, Debug, Clone)]
#[error("Invalid report definition")]
pub struct ReportValidationError {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub definition: Box<NormalizedDefinition>,
}

/// Errors returned by [`ReportEngine::run`](super::ReportEngine::run).
#[derive(Error, Debug)]
pub enum ReportError {
    /// The definition is invalid; nothing was executed.
    #[error(transparent)]
    Validation(#[from] ReportValidationError),

    /// A report query failed.
    #[error("report query failed: {0}")]
    Execution(#[source] ExecError),

    /// A report query exceeded its deadline.
    #[error("report query timed out after {0:?}")]
    Timeout(Duration),

    /// The request was cancelled.
    #[error("report cancelled")]
    Cancelled,
}

impl ReportError {
    /// Validation errors, if this is a validation failure.
    pub fn validation(&self) -> Option<&ReportValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ExecError> for ReportError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Timeout(d) => Self::Timeout(d),
            ExecError::Cancelled => Self::Cancelled,
            other => Self::Execution(other),
        }
    }
}
