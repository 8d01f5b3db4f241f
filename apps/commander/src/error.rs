use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors that stop the command-line driver before a command completes.
///
/// A command that fails on the server is not one of these; it is reported as
/// the command's outcome.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CommanderError {
    /// Error from this App
    #[error("Commander Error: {message} {location}")]
    Commander {
        message: String,
        location: ErrorLocation,
    },

    /// Bad command-line arguments
    #[error("Usage Error: {message} {location}")]
    Usage {
        message: String,
        location: ErrorLocation,
    },

    /// Error from commander-client (config, transport, shutdown)
    #[error("Client Error: {message} {location}")]
    Client {
        message: String,
        location: ErrorLocation,
    },
}
