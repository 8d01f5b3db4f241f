use crate::protocol::MessageId;

use std::future::poll_fn;
use std::time::Duration;

use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::{Expired, Key};

/// Deadlines for every pending request of one generation.
///
/// All timers live in a single queue polled by the generation's event loop,
/// so expiry is observed on the same task that handles responses and no
/// timer can outlive the generation.
pub(crate) struct TimeoutSupervisor {
    queue: DelayQueue<MessageId>,
}

impl TimeoutSupervisor {
    pub(crate) fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
        }
    }

    pub(crate) fn start(&mut self, message_id: MessageId, timeout: Duration) -> Key {
        self.queue.insert(message_id, timeout)
    }

    /// Cancel a timer that has not yet been yielded by [`Self::expired`].
    pub(crate) fn cancel(&mut self, key: &Key) {
        self.queue.remove(key);
    }

    /// Wait for the next deadline. Resolves to `None` immediately when no
    /// timers are running.
    pub(crate) async fn expired(&mut self) -> Option<MessageId> {
        poll_fn(|cx| self.queue.poll_expired(cx))
            .await
            .map(Expired::into_inner)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
