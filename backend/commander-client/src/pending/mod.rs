//! Pending request bookkeeping for one connection generation.
//!
//! A [`PendingTable`] is created when a generation starts and dropped when it
//! ends. Every request it still holds at that point is resolved with
//! `LostConnection`, so no caller is left waiting on a table that no longer
//! exists.

mod completion;
mod request;
mod table;
mod timeout;

pub use completion::{Failure, Progress, Reply};

pub(crate) use completion::Completion;
pub(crate) use table::PendingTable;
