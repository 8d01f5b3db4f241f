use crate::lifecycle::{EventEmitter, LifecycleEvent};
use crate::pending::{Completion, PendingTable};
use crate::protocol::InboundFrame;
use crate::protocol::frame::decode;

use log::{debug, trace, warn};

/// Parse one inbound frame and route it.
///
/// Protocol faults (bad JSON, missing or unknown ids, empty payloads) are
/// logged and the frame is dropped; they never end the generation.
pub(crate) fn route(text: &str, table: &mut PendingTable, events: &EventEmitter) {
    let frame = match decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping inbound frame: {e}");
            return;
        }
    };

    match frame {
        InboundFrame::Tick => trace!("Server heartbeat"),
        InboundFrame::ServerTime(time) => events.emit(LifecycleEvent::ServerTime(time)),
        InboundFrame::Response {
            message_id,
            payload,
        } => {
            debug!(
                "Routing {} response for {message_id}",
                if payload.is_terminal() { "terminal" } else { "progress" }
            );
            if let Err(e) = table.resolve(&message_id, Completion::from(payload)) {
                warn!("Dropping inbound frame: {e}");
            }
        }
    }
}
