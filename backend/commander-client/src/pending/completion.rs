use crate::error::command::CommandError;
use crate::protocol::{MessageId, ResponsePayload};

use serde_json::Value;

/// Terminal success delivered to a command's reply handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message_id: MessageId,
    pub data: Value,
    /// Context value attached at submission, echoed back unchanged.
    pub original: Option<Value>,
}

/// Partial result delivered to a command's progress handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub message_id: MessageId,
    pub progress: Value,
    pub original: Option<Value>,
}

/// Terminal failure delivered to a command's error handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message_id: MessageId,
    pub error: CommandError,
    pub original: Option<Value>,
}

/// One resolution step for a pending request: any number of `Progress`, then
/// at most one of `Reply` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    Progress(Value),
    Reply(Value),
    Error(CommandError),
}

impl Completion {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, Completion::Progress(_))
    }
}

impl From<ResponsePayload> for Completion {
    fn from(payload: ResponsePayload) -> Self {
        match payload {
            ResponsePayload::Progress(progress) => Completion::Progress(progress),
            ResponsePayload::Result(result) => Completion::Reply(result),
            ResponsePayload::ErrorCode {
                error_code,
                details,
            } => Completion::Error(CommandError::Remote {
                error_code,
                details,
            }),
            ResponsePayload::Application { namespace, msg } => {
                Completion::Error(CommandError::Application { namespace, msg })
            }
        }
    }
}
