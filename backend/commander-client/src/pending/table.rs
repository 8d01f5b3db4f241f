use crate::client::normalizer::ResponseHandlers;
use crate::error::command::CommandError;
use crate::error::protocol::ProtocolError;
use crate::pending::Completion;
use crate::pending::request::PendingRequest;
use crate::pending::timeout::TimeoutSupervisor;
use crate::protocol::MessageId;

use common::ErrorLocation;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::Location;
use std::time::Duration;

use log::{debug, error, warn};

/// Correlation id → in-flight request map owned by one connection generation.
///
/// Only the generation's event loop touches the table: the receiver resolves
/// entries, the timeout supervisor expires them and teardown fails whatever is
/// left. Nothing else holds a reference, so no locking is needed.
pub(crate) struct PendingTable {
    generation: u64,
    entries: HashMap<MessageId, PendingRequest>,
    timeouts: TimeoutSupervisor,
}

impl PendingTable {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            entries: HashMap::new(),
            timeouts: TimeoutSupervisor::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn contains(&self, message_id: &MessageId) -> bool {
        self.entries.contains_key(message_id)
    }

    /// Number of timers still armed. Always equal to [`Self::len`].
    #[cfg(test)]
    pub(crate) fn active_timers(&self) -> usize {
        self.timeouts.len()
    }

    /// Track a new request and arm its deadline.
    pub(crate) fn register(
        &mut self,
        message_id: MessageId,
        mut handlers: ResponseHandlers,
        timeout: Duration,
    ) {
        match self.entries.entry(message_id) {
            Entry::Occupied(entry) => {
                let message_id = entry.key().clone();
                error!(
                    "Refusing to register duplicate message id {message_id} in generation {}",
                    self.generation
                );
                handlers.deliver(
                    &message_id,
                    Completion::Error(CommandError::Internal {
                        message: format!("Duplicate message id {message_id}"),
                    }),
                );
            }
            Entry::Vacant(entry) => {
                let key = self.timeouts.start(entry.key().clone(), timeout);
                let request = PendingRequest::new(entry.key().clone(), handlers, key);
                debug!(
                    "Registered {} in generation {} with timeout {timeout:?}",
                    entry.key(),
                    self.generation
                );
                entry.insert(request);
            }
        }
    }

    /// Route a response to its request.
    ///
    /// Progress keeps the entry and its timer. A terminal completion cancels
    /// the timer and removes the entry before the handler runs.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessageId`] if no request with this id is
    /// pending in this generation (late, duplicate or foreign responses).
    #[track_caller]
    pub(crate) fn resolve(
        &mut self,
        message_id: &MessageId,
        completion: Completion,
    ) -> Result<(), ProtocolError> {
        if !completion.is_terminal() {
            return match self.entries.get_mut(message_id) {
                Some(request) => {
                    request.resolve(completion);
                    Ok(())
                }
                None => Err(self.unknown(message_id)),
            };
        }

        match self.entries.remove(message_id) {
            Some(mut request) => {
                if let Some(key) = request.take_timeout_key() {
                    self.timeouts.cancel(&key);
                }
                request.resolve(completion);
                Ok(())
            }
            None => Err(self.unknown(message_id)),
        }
    }

    /// Wait for the next request deadline to pass.
    pub(crate) async fn next_expired(&mut self) -> Option<MessageId> {
        self.timeouts.expired().await
    }

    /// Resolve an expired request with `Timedout`.
    pub(crate) fn expire(&mut self, message_id: &MessageId) {
        let Some(mut request) = self.entries.remove(message_id) else {
            debug!("Timer fired for {message_id} which is no longer pending");
            return;
        };

        // The queue already yielded this key; cancelling it again would panic.
        request.take_timeout_key();

        if !request.is_completed() {
            warn!(
                "Timed out waiting for a reply to {message_id} in generation {}",
                self.generation
            );
            request.resolve(Completion::Error(CommandError::Timedout));
        }
    }

    /// Resolve a single request with a synthesized error.
    ///
    /// Returns false if the request was not pending.
    pub(crate) fn fail(&mut self, message_id: &MessageId, error: CommandError) -> bool {
        match self.entries.remove(message_id) {
            Some(mut request) => {
                if let Some(key) = request.take_timeout_key() {
                    self.timeouts.cancel(&key);
                }
                request.resolve(Completion::Error(error));
                true
            }
            None => false,
        }
    }

    /// Resolve every pending request with `error` and empty the table.
    ///
    /// Each timer is cancelled before its request's handler runs.
    pub(crate) fn fail_all(&mut self, error: CommandError) -> usize {
        let drained: Vec<PendingRequest> = self.entries.drain().map(|(_, request)| request).collect();
        let count = drained.len();

        for mut request in drained {
            if let Some(key) = request.take_timeout_key() {
                self.timeouts.cancel(&key);
            }
            request.resolve(Completion::Error(error.clone()));
        }
        debug_assert_eq!(self.timeouts.len(), 0);

        if count > 0 {
            warn!(
                "Resolved {count} pending request(s) of generation {} with {}",
                self.generation,
                error.error_code().unwrap_or("error")
            );
        }
        count
    }

    #[track_caller]
    fn unknown(&self, message_id: &MessageId) -> ProtocolError {
        ProtocolError::UnknownMessageId {
            message: format!(
                "Got a message from the server with unknown message id {message_id} (generation {})",
                self.generation
            ),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl Drop for PendingTable {
    /// Runs when a generation is dropped without an orderly teardown, for
    /// example when the supervisor task is aborted. Timers die with the queue.
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }

        warn!(
            "Generation {} dropped with {} pending request(s)",
            self.generation,
            self.len()
        );
        for (_, mut request) in self.entries.drain() {
            request.resolve(Completion::Error(CommandError::LostConnection));
        }
    }
}
