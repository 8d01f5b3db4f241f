//! Shared building blocks for the commander workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): Types shared by every other crate
//! - **commander-client**: The correlated command/response protocol client
//! - **commander**: Command-line driver wiring logging, config and the client
//!
//! Keeping error location tracking here lets every crate report errors in the
//! same `"<Kind> Error: {message} [file:line:column]"` shape.

pub mod error;

pub use error::error_location::ErrorLocation;
