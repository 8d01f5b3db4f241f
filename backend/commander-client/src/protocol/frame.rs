//! Encoding of outbound commands and classification of inbound frames.

use crate::error::protocol::ProtocolError;
use crate::protocol::{MessageId, SERVER_TIME_MESSAGE_ID, TICK_MESSAGE_ID};

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire form of a submitted command.
#[derive(Debug, Serialize)]
pub struct CommandFrame<'a> {
    pub path: &'a str,
    pub body: &'a Value,
    pub message_id: &'a MessageId,
}

#[derive(Debug, Serialize)]
struct TickFrame {
    path: &'static str,
}

/// Inbound frame after correlation id extraction and shape classification.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Server heartbeat; carries nothing.
    Tick,
    /// Server clock value published under the reserved id.
    ServerTime(Value),
    /// Response correlated with a submitted command.
    Response {
        message_id: MessageId,
        payload: ResponsePayload,
    },
}

/// What a correlated response says about its command.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Non-terminal partial result.
    Progress(Value),
    /// Terminal success.
    Result(Value),
    /// Terminal failure expressed as a reply with an `error_code` field.
    ErrorCode {
        error_code: String,
        details: Map<String, Value>,
    },
    /// Terminal failure raised by a server-side handler.
    Application { namespace: String, msg: Value },
}

impl ResponsePayload {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponsePayload::Progress(_))
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    message_id: Value,
    #[serde(default)]
    reply: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Serialize a command as `{path, body, message_id}`.
pub fn encode_command(
    path: &str,
    body: &Value,
    message_id: &MessageId,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CommandFrame {
        path,
        body,
        message_id,
    })
}

/// Serialize the keepalive frame. It has no correlation id.
pub fn encode_tick() -> String {
    // A struct with one static string field cannot fail to serialize.
    serde_json::to_string(&TickFrame {
        path: TICK_MESSAGE_ID,
    })
    .unwrap_or_else(|_| format!("{{\"path\":\"{TICK_MESSAGE_ID}\"}}"))
}

/// Parse and classify one inbound text frame.
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] if the text is not a JSON object or the id has the wrong shape
/// - [`ProtocolError::MissingMessageId`] if there is no usable correlation id
/// - [`ProtocolError::UnrecognisedPayload`] if a correlated frame has neither `reply` nor `error`
#[track_caller]
pub fn decode(text: &str) -> Result<InboundFrame, ProtocolError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
        message: format!("Failed to parse json from the server: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let message_id = parse_message_id(raw.message_id)?;

    if let MessageId::Single(id) = &message_id {
        if id == TICK_MESSAGE_ID {
            return Ok(InboundFrame::Tick);
        }
        if id == SERVER_TIME_MESSAGE_ID {
            return Ok(InboundFrame::ServerTime(raw.reply.unwrap_or(Value::Null)));
        }
    }

    match classify(raw.reply, raw.error) {
        Some(payload) => Ok(InboundFrame::Response {
            message_id,
            payload,
        }),
        None => Err(ProtocolError::UnrecognisedPayload {
            message: format!("Frame for {message_id} has neither a reply nor an error"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

#[track_caller]
fn parse_message_id(value: Value) -> Result<MessageId, ProtocolError> {
    match value {
        Value::Null => Err(ProtocolError::MissingMessageId {
            message: "Got a message from the server without a message id".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
        Value::String(id) if id.is_empty() => Err(ProtocolError::MissingMessageId {
            message: "Got a message from the server with an empty message id".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
        Value::String(id) => Ok(MessageId::Single(id)),
        Value::Array(items) if !items.is_empty() => items
            .into_iter()
            .map(|item| match item {
                Value::String(id) => Ok(id),
                other => Err(ProtocolError::Malformed {
                    message: format!("Message id chain contains a non-string element: {other}"),
                    location: ErrorLocation::from(Location::caller()),
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(MessageId::Chain),
        other => Err(ProtocolError::Malformed {
            message: format!("Unsupported message id: {other}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

fn classify(reply: Option<Value>, error: Option<Value>) -> Option<ResponsePayload> {
    if let Some(error) = error {
        return Some(application_error(error));
    }

    let mut fields = match reply? {
        Value::Object(fields) => fields,
        other => return Some(ResponsePayload::Result(other)),
    };

    if let Some(progress) = fields.get("progress").filter(|v| !v.is_null()) {
        return Some(ResponsePayload::Progress(progress.clone()));
    }

    if let Some(code) = fields.get("error_code").filter(|v| !v.is_null()) {
        let error_code = match code {
            Value::String(code) => code.clone(),
            other => other.to_string(),
        };
        return Some(ResponsePayload::ErrorCode {
            error_code,
            details: fields,
        });
    }

    if fields.get("error").is_some_and(Value::is_object) {
        let error = fields.remove("error").unwrap_or_default();
        return Some(application_error(error));
    }

    match fields.remove("result") {
        Some(result) => Some(ResponsePayload::Result(result)),
        None => Some(ResponsePayload::Result(Value::Object(fields))),
    }
}

fn application_error(error: Value) -> ResponsePayload {
    match error {
        Value::Object(mut fields) => {
            let namespace = match fields.remove("namespace") {
                Some(Value::String(namespace)) => namespace,
                _ => String::new(),
            };
            let msg = fields.remove("msg").unwrap_or(Value::Object(fields));
            ResponsePayload::Application { namespace, msg }
        }
        other => ResponsePayload::Application {
            namespace: String::new(),
            msg: other,
        },
    }
}
