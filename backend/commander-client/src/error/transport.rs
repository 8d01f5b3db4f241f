use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}

impl From<WsError> for TransportError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let message = error.to_string();
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed {
                message,
                location: ErrorLocation::from(Location::caller()),
            },
            _ => TransportError::Read {
                message,
                location: ErrorLocation::from(Location::caller()),
            },
        }
    }
}
