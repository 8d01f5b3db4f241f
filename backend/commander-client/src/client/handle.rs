//! Handle to the running connection supervisor.

use crate::error::ClientError;

use common::ErrorLocation;

use std::panic::Location;

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle handle returned by [`CommanderClient::start`].
///
/// Dropping the handle does **not** stop the supervisor; it keeps
/// reconnecting until [`ClientHandle::shutdown`] is called or the runtime
/// shuts down. Either way every pending request is resolved with
/// `LostConnection`.
///
/// [`CommanderClient::start`]: crate::client::CommanderClient::start
pub struct ClientHandle {
    pub(crate) shutdown: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl ClientHandle {
    /// Stop reconnecting, tear down the live generation and wait for the
    /// supervisor to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Shutdown`] if the supervisor task panicked.
    pub async fn shutdown(self) -> Result<(), ClientError> {
        info!("Shutting down commander client");
        self.shutdown.cancel();

        self.task.await.map_err(|e| ClientError::Shutdown {
            message: format!("Supervisor task failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
