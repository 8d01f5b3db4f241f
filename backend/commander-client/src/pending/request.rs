use crate::client::normalizer::ResponseHandlers;
use crate::pending::Completion;
use crate::protocol::MessageId;

use log::debug;
use tokio_util::time::delay_queue::Key;

/// An in-flight command awaiting progress or its terminal response.
pub(crate) struct PendingRequest {
    message_id: MessageId,
    handlers: ResponseHandlers,
    timeout_key: Option<Key>,
    completed: bool,
}

impl PendingRequest {
    pub(crate) fn new(message_id: MessageId, handlers: ResponseHandlers, timeout_key: Key) -> Self {
        Self {
            message_id,
            handlers,
            timeout_key: Some(timeout_key),
            completed: false,
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed
    }

    /// Hand over the timer key so the caller can cancel it. Returns `None`
    /// once the timer has already fired or been cancelled.
    pub(crate) fn take_timeout_key(&mut self) -> Option<Key> {
        self.timeout_key.take()
    }

    /// Apply one completion. `completed` flips on the first terminal
    /// completion; anything after that is ignored.
    ///
    /// Returns true if the completion reached the handlers.
    pub(crate) fn resolve(&mut self, completion: Completion) -> bool {
        if self.completed {
            debug!(
                "Ignoring {completion:?} for {} after it already completed",
                self.message_id
            );
            return false;
        }

        if completion.is_terminal() {
            self.completed = true;
        }

        self.handlers.deliver(&self.message_id, completion);
        true
    }
}
