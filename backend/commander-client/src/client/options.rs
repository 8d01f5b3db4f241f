use crate::client::normalizer::{ErrorHandler, ProgressHandler, ReplyHandler};
use crate::pending::{Failure, Progress, Reply};

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::time::Duration;

use serde_json::Value;

/// Per-command callbacks and settings for [`CommanderClient::submit`].
///
/// Every field is optional. Without a timeout the client's configured request
/// timeout applies; without an error handler failures go to the client's
/// default error handler.
///
/// [`CommanderClient::submit`]: crate::client::CommanderClient::submit
#[derive(Default)]
pub struct SubmitOptions {
    pub(crate) on_reply: Option<ReplyHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) on_progress: Option<ProgressHandler>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) parent_correlation_ids: Option<Vec<String>>,
    pub(crate) original: Option<Value>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reply(mut self, handler: impl FnMut(Reply) + Send + 'static) -> Self {
        self.on_reply = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(Failure) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub fn on_progress(mut self, handler: impl FnMut(Progress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(handler));
        self
    }

    /// How long to wait for a terminal response before failing with `Timedout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ids of the commands that caused this one. The submitted message id is
    /// this chain with a fresh id appended.
    pub fn parent_correlation_ids(mut self, parents: Vec<String>) -> Self {
        self.parent_correlation_ids = Some(parents);
        self
    }

    /// Context echoed back in every reply, progress and failure of this command.
    pub fn original(mut self, original: Value) -> Self {
        self.original = Some(original);
        self
    }
}

impl Debug for SubmitOptions {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("SubmitOptions")
            .field("on_reply", &self.on_reply.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("timeout", &self.timeout)
            .field("parent_correlation_ids", &self.parent_correlation_ids)
            .field("original", &self.original)
            .finish()
    }
}
