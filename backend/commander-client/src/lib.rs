//! Correlated command/response client for a commander WebSocket server.
//!
//! Commands are submitted with [`CommanderClient::submit`] and resolved
//! through callbacks: zero or more progress notifications followed by exactly
//! one reply or error, across disconnects, timeouts and reconnects.
//!
//! # Architecture
//!
//! - [`client`] - public submission API and callback normalisation
//! - [`connection`] - supervisor, sender, receiver, heartbeat and transport
//! - [`pending`] - per-generation pending request table and timeouts
//! - [`protocol`] - JSON wire envelopes and correlation ids
//! - [`lifecycle`] - connection lifecycle events and status snapshot

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod pending;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use client::{ClientBuilder, ClientHandle, CommanderClient, SubmitOptions};
pub use config::ClientConfig;
pub use connection::ConnectionStatus;
pub use error::command::CommandError;
pub use lifecycle::{ConnectionFault, LifecycleEvent};
pub use pending::{Failure, Progress, Reply};
pub use protocol::{ErrorCode, MessageId};

pub const COMMANDER_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const COMMANDER_SERVER_PORT: u16 = 6100;
pub const COMMANDER_WS_PATH: &str = "/v1/ws";
pub const COMMANDER_DEFAULT_ENDPOINT: &str = const_format::concatcp!(
    "ws://",
    COMMANDER_SERVER_HOSTNAME,
    ":",
    COMMANDER_SERVER_PORT,
    COMMANDER_WS_PATH
);
