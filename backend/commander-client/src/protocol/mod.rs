//! JSON wire protocol spoken with the commander server.
//!
//! Client → server:
//!
//! ```text
//! { "path": string, "body": any, "message_id": string | [string] }
//! { "path": "__tick__" }
//! ```
//!
//! Server → client: a `reply` (`result`, `progress` or `error_code`), an
//! `error` object carrying `msg`/`namespace`, a `__tick__` heartbeat, or a
//! `__server_time__` clock update.

mod error_code;
pub mod frame;
mod message_id;

pub use error_code::ErrorCode;
pub use frame::{InboundFrame, ResponsePayload};
pub use message_id::MessageId;

/// Correlation id of heartbeat frames in both directions.
pub const TICK_MESSAGE_ID: &str = "__tick__";

/// Correlation id the server uses to publish its clock.
pub const SERVER_TIME_MESSAGE_ID: &str = "__server_time__";
