use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Faults in inbound frames. Always logged and dropped, never fatal.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("Malformed Frame Error: {message} {location}")]
    Malformed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Missing Message Id Error: {message} {location}")]
    MissingMessageId {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Message Id Error: {message} {location}")]
    UnknownMessageId {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unrecognised Payload Error: {message} {location}")]
    UnrecognisedPayload {
        message: String,
        location: ErrorLocation,
    },
}
