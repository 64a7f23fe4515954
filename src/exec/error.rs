//! Query execution errors.

use std::time::Duration;

use thiserror::Error;

/// Result type for query execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised while running a compiled query.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The driver rejected or failed the query.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The query did not finish before its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("query cancelled")]
    Cancelled,

    /// The blocking task running the query panicked or was aborted.
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A previous query panicked while holding the shared connection.
    #[error("connection lock poisoned")]
    Poisoned,
}

impl ExecError {
    /// Timeout or cancellation, as opposed to a database failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}
