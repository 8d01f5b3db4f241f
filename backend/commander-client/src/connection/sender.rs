use crate::connection::transport::Transport;
use crate::error::command::CommandError;
use crate::pending::PendingTable;
use crate::protocol::MessageId;

use std::collections::VecDeque;

use log::{debug, warn};

struct Outgoing {
    message_id: MessageId,
    frame: String,
}

/// FIFO of serialized commands waiting to be written.
///
/// Commands are written in the order they were registered. A command whose
/// request already resolved (for example it timed out while the connection
/// was still opening) is skipped rather than written.
pub(crate) struct Sender {
    queue: VecDeque<Outgoing>,
}

impl Sender {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, message_id: MessageId, frame: String) {
        self.queue.push_back(Outgoing { message_id, frame });
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Write everything queued.
    ///
    /// When the transport is not writable the command is not retried or
    /// requeued: its request fails with `InactiveConnection`.
    pub(crate) async fn flush<T: Transport>(&mut self, transport: &mut T, table: &mut PendingTable) {
        while let Some(Outgoing { message_id, frame }) = self.queue.pop_front() {
            if !table.contains(&message_id) {
                debug!("Not sending {message_id}: it was resolved before it could be written");
                continue;
            }

            if !transport.is_writable() {
                warn!("Connection to the server wasn't active when sending {message_id}");
                table.fail(&message_id, CommandError::InactiveConnection);
                continue;
            }

            if let Err(e) = transport.send(frame).await {
                warn!("Failed to send {message_id}: {e}");
                table.fail(&message_id, CommandError::InactiveConnection);
            }
        }
    }
}
