//! Turns a `(path, body, options)` submission into a trackable command.
//!
//! User callbacks are wrapped here so that a panic inside one is caught,
//! logged and reported to the default error handler as an `INTERNAL_ERROR`
//! failure instead of unwinding through the supervisor's event loop.

use crate::client::options::SubmitOptions;
use crate::error::command::CommandError;
use crate::pending::{Completion, Failure, Progress, Reply};
use crate::protocol::MessageId;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde_json::Value;

pub type ReplyHandler = Box<dyn FnMut(Reply) + Send>;
pub type ProgressHandler = Box<dyn FnMut(Progress) + Send>;
pub type ErrorHandler = Box<dyn FnMut(Failure) + Send>;

/// Fallback for failures nobody else handles: panicking callbacks and errors
/// of commands submitted without an error handler.
pub type DefaultErrorHandler = Arc<dyn Fn(Failure) + Send + Sync>;

/// Default error handler used when the application does not install one.
pub fn log_failure() -> DefaultErrorHandler {
    Arc::new(|failure: Failure| {
        error!(
            "Unhandled failure for {}: {}",
            failure.message_id, failure.error
        );
    })
}

/// A normalised command waiting to be registered by the current generation.
pub(crate) struct Submission {
    pub(crate) message_id: MessageId,
    pub(crate) path: String,
    pub(crate) body: Value,
    pub(crate) timeout: Option<Duration>,
    pub(crate) handlers: ResponseHandlers,
}

/// Build a [`Submission`] from the public API's arguments, generating its
/// correlation id.
pub(crate) fn normalise(
    path: String,
    body: Value,
    options: SubmitOptions,
    default_error: DefaultErrorHandler,
) -> Submission {
    let SubmitOptions {
        on_reply,
        on_error,
        on_progress,
        timeout,
        parent_correlation_ids,
        original,
    } = options;

    let message_id = MessageId::generate(parent_correlation_ids.as_deref());

    Submission {
        message_id: message_id.clone(),
        path,
        body,
        timeout,
        handlers: ResponseHandlers {
            message_id,
            on_reply,
            on_error,
            on_progress,
            original,
            default_error,
            done: false,
        },
    }
}

/// The callbacks of one command, with the single-terminal guard.
///
/// Dropping the handlers before a terminal completion delivers
/// `LostConnection`, so a command discarded anywhere between submission and
/// resolution (a closed queue, an aborted supervisor task) is never silent.
pub(crate) struct ResponseHandlers {
    message_id: MessageId,
    on_reply: Option<ReplyHandler>,
    on_error: Option<ErrorHandler>,
    on_progress: Option<ProgressHandler>,
    original: Option<Value>,
    default_error: DefaultErrorHandler,
    done: bool,
}

impl ResponseHandlers {
    /// Invoke the handler matching `completion`.
    ///
    /// Once a reply or error has been delivered every later completion is
    /// dropped, even if the table somehow resolves the request twice.
    pub(crate) fn deliver(&mut self, message_id: &MessageId, completion: Completion) {
        if self.done {
            debug!("Dropping {completion:?} for {message_id}: already resolved");
            return;
        }

        match completion {
            Completion::Progress(progress) => {
                if let Some(on_progress) = self.on_progress.as_mut() {
                    let progress = Progress {
                        message_id: message_id.clone(),
                        progress,
                        original: self.original.clone(),
                    };
                    guarded(message_id, &self.original, &self.default_error, "progress", || {
                        on_progress(progress)
                    });
                }
            }
            Completion::Reply(data) => {
                self.done = true;
                match self.on_reply.as_mut() {
                    Some(on_reply) => {
                        let reply = Reply {
                            message_id: message_id.clone(),
                            data,
                            original: self.original.clone(),
                        };
                        guarded(message_id, &self.original, &self.default_error, "reply", || {
                            on_reply(reply)
                        });
                    }
                    None => debug!("Reply for {message_id} has no handler"),
                }
            }
            Completion::Error(error) => {
                self.done = true;
                let failure = Failure {
                    message_id: message_id.clone(),
                    error,
                    original: self.original.clone(),
                };
                match self.on_error.as_mut() {
                    Some(on_error) => {
                        guarded(message_id, &self.original, &self.default_error, "error", || {
                            on_error(failure)
                        });
                    }
                    None => report(&self.default_error, failure),
                }
            }
        }
    }
}

impl Drop for ResponseHandlers {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        let message_id = self.message_id.clone();
        warn!("Command {message_id} was discarded before it completed");
        self.deliver(&message_id, Completion::Error(CommandError::LostConnection));
    }
}

fn guarded(
    message_id: &MessageId,
    original: &Option<Value>,
    default_error: &DefaultErrorHandler,
    kind: &str,
    call: impl FnOnce(),
) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
        let message = panic_message(panic.as_ref());
        error!("The {kind} handler for {message_id} panicked: {message}");
        report(
            default_error,
            Failure {
                message_id: message_id.clone(),
                error: CommandError::Internal { message },
                original: original.clone(),
            },
        );
    }
}

fn report(default_error: &DefaultErrorHandler, failure: Failure) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| default_error(failure))) {
        error!(
            "The default error handler panicked: {}",
            panic_message(panic.as_ref())
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
