//! Per-request context.

use std::time::Duration;

use crate::exec::{CancelSignal, QueryContext, DEFAULT_QUERY_TIMEOUT};

/// Who is asking, and how long each query may take.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Owner id checked against stored filters. `None` disables stored
    /// filter lookups.
    pub user_id: Option<String>,
    pub cancel: CancelSignal,
    pub query_timeout: Duration,
}

impl ReportContext {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            cancel: CancelSignal::never(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Context handed to every query issued for this request.
    pub fn query_context(&self) -> QueryContext {
        QueryContext::new(self.query_timeout, self.cancel.clone())
    }
}

impl Default for ReportContext {
    fn default() -> Self {
        Self::new(None)
    }
}
