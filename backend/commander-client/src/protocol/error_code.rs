use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

/// Error codes synthesized by the client itself.
///
/// Codes sent by the server are forwarded as plain strings and never parsed
/// into this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    FailedToConnected,
    ServerWentAway,
    LostConnection,
    InactiveConnection,
    Timedout,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FailedToConnected => "FailedToConnected",
            ErrorCode::ServerWentAway => "ServerWentAway",
            ErrorCode::LostConnection => "LostConnection",
            ErrorCode::InactiveConnection => "InactiveConnection",
            ErrorCode::Timedout => "Timedout",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Human readable explanation sent alongside the code.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::FailedToConnected => "Could not connect to server",
            ErrorCode::ServerWentAway => "Server went away",
            ErrorCode::LostConnection => "Lost connection to the server",
            ErrorCode::InactiveConnection => "Connection to the server wasn't active",
            ErrorCode::Timedout => "Timedout waiting for a reply to the message",
            ErrorCode::InternalError => "A response handler failed",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}
