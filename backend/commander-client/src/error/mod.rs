pub mod command;
pub mod config;
pub mod protocol;
pub mod transport;

pub use command::CommandError;
pub use config::ConfigError;
pub use protocol::ProtocolError;
pub use transport::TransportError;

use common::ErrorLocation;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Shutdown Error: {message} {location}")]
    Shutdown {
        message: String,
        location: ErrorLocation,
    },
}
