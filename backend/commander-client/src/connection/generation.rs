use crate::client::normalizer::Submission;
use crate::connection::sender::Sender;
use crate::error::command::CommandError;
use crate::pending::{Completion, PendingTable};
use crate::protocol::frame::encode_command;

use std::time::Duration;

use log::{error, info};

/// Everything scoped to one connection attempt: its pending request table and
/// its outgoing queue.
///
/// A generation is created when the supervisor starts connecting and consumed
/// by [`Generation::teardown`]. Responses read under this generation can only
/// ever reach requests registered in it.
pub(crate) struct Generation {
    number: u64,
    default_timeout: Duration,
    pub(crate) table: PendingTable,
    pub(crate) sender: Sender,
}

impl Generation {
    pub(crate) fn new(number: u64, default_timeout: Duration) -> Self {
        Self {
            number,
            default_timeout,
            table: PendingTable::new(number),
            sender: Sender::new(),
        }
    }

    pub(crate) fn number(&self) -> u64 {
        self.number
    }

    /// Track the command, start its timer and queue its frame.
    pub(crate) fn register(&mut self, submission: Submission) {
        let Submission {
            message_id,
            path,
            body,
            timeout,
            mut handlers,
        } = submission;

        let frame = match encode_command(&path, &body, &message_id) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize command {path} ({message_id}): {e}");
                handlers.deliver(
                    &message_id,
                    Completion::Error(CommandError::Internal {
                        message: format!("Failed to serialize command: {e}"),
                    }),
                );
                return;
            }
        };

        self.table.register(
            message_id.clone(),
            handlers,
            timeout.unwrap_or(self.default_timeout),
        );
        self.sender.enqueue(message_id, frame);
    }

    /// Fail every unresolved request with `LostConnection` and discard the
    /// generation.
    pub(crate) fn teardown(mut self) -> usize {
        let unsent = self.sender.len();
        let lost = self.table.fail_all(CommandError::LostConnection);
        info!(
            "Generation {} torn down ({lost} request(s) lost, {unsent} never written)",
            self.number
        );
        lost
    }
}
