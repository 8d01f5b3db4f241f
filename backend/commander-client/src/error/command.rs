use crate::protocol::ErrorCode;

use serde_json::{Map, Value, json};
use thiserror::Error as ThisError;

/// Why a command ended without a reply.
///
/// Delivered to the command's error handler exactly once. Unlike the other
/// error types in this crate these are protocol outcomes rather than faults in
/// the client, so they carry no source location.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum CommandError {
    /// No terminal response arrived before the request's deadline.
    #[error("Timedout: Timedout waiting for a reply to the message")]
    Timedout,

    /// The connection closed (or the client shut down) while the request was pending.
    #[error("LostConnection: Lost connection to the server")]
    LostConnection,

    /// The command could not be written because the socket was not open.
    #[error("InactiveConnection: Connection to the server wasn't active")]
    InactiveConnection,

    /// The server replied with an `error_code`; the other reply fields are kept.
    #[error("{error_code}: {}", render_details(.details))]
    Remote {
        error_code: String,
        details: Map<String, Value>,
    },

    /// A server-side handler raised an error.
    #[error("{namespace}: {msg}")]
    Application { namespace: String, msg: Value },

    /// A response handler panicked while processing this command.
    #[error("INTERNAL_ERROR: {message}")]
    Internal { message: String },
}

impl CommandError {
    /// The `error_code` this error carries on the wire, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            CommandError::Timedout => Some(ErrorCode::Timedout.as_str()),
            CommandError::LostConnection => Some(ErrorCode::LostConnection.as_str()),
            CommandError::InactiveConnection => Some(ErrorCode::InactiveConnection.as_str()),
            CommandError::Internal { .. } => Some(ErrorCode::InternalError.as_str()),
            CommandError::Remote { error_code, .. } => Some(error_code),
            CommandError::Application { .. } => None,
        }
    }

    /// Namespace of an application error; empty for every other kind.
    pub fn namespace(&self) -> &str {
        match self {
            CommandError::Application { namespace, .. } => namespace,
            _ => "",
        }
    }

    /// Whether the client produced this error without hearing from the server.
    pub fn is_synthesized(&self) -> bool {
        matches!(
            self,
            CommandError::Timedout
                | CommandError::LostConnection
                | CommandError::InactiveConnection
                | CommandError::Internal { .. }
        )
    }

    /// JSON rendering in the `{error_code, error, namespace}` shape handlers expect.
    pub fn to_json(&self) -> Value {
        match self {
            CommandError::Timedout => synthesized(ErrorCode::Timedout),
            CommandError::LostConnection => synthesized(ErrorCode::LostConnection),
            CommandError::InactiveConnection => synthesized(ErrorCode::InactiveConnection),
            CommandError::Internal { message } => json!({
                "error_code": ErrorCode::InternalError.as_str(),
                "error": message,
                "namespace": "",
            }),
            CommandError::Remote {
                error_code,
                details,
            } => {
                let mut fields = details.clone();
                fields.insert("error_code".to_string(), Value::String(error_code.clone()));
                fields.insert("namespace".to_string(), Value::String(String::new()));
                Value::Object(fields)
            }
            CommandError::Application { namespace, msg } => {
                let mut fields = match msg {
                    Value::Object(fields) => fields.clone(),
                    other => {
                        let mut fields = Map::new();
                        fields.insert("error".to_string(), other.clone());
                        fields
                    }
                };
                fields.insert("namespace".to_string(), Value::String(namespace.clone()));
                Value::Object(fields)
            }
        }
    }
}

fn synthesized(code: ErrorCode) -> Value {
    json!({
        "error_code": code.as_str(),
        "error": code.description(),
        "namespace": "",
    })
}

fn render_details(details: &Map<String, Value>) -> String {
    serde_json::to_string(details).unwrap_or_default()
}
