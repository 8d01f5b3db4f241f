//! Connection lifecycle: one supervisor task, one generation per attempt.
//!
//! # Components
//!
//! - `supervisor`: connect, run, close, back off, reconnect
//! - `generation`: pending table + outgoing queue scoped to one attempt
//! - `sender`: FIFO writer with `InactiveConnection` on a dead socket
//! - `receiver`: frame parsing and routing by correlation id
//! - `heartbeat`: keepalive ticks while connected
//! - [`transport`]: the duplex connection seam and its WebSocket implementation

mod connection_state;
mod generation;
mod heartbeat;
mod receiver;
mod sender;
pub(crate) mod supervisor;
pub mod transport;

pub use connection_state::ConnectionStatus;
pub use transport::{Connector, Transport, WsConnector, WsTransport};
