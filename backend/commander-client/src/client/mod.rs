//! Public submission API.
//!
//! [`CommanderClient`] is a cheap, cloneable front for the connection
//! supervisor. Submitting never blocks and never fails synchronously: every
//! command is eventually resolved through its callbacks.

mod handle;
pub(crate) mod normalizer;
mod options;

pub use handle::ClientHandle;
pub use normalizer::{DefaultErrorHandler, ErrorHandler, ProgressHandler, ReplyHandler, log_failure};
pub use options::SubmitOptions;

use crate::client::normalizer::{Submission, normalise};
use crate::config::ClientConfig;
use crate::connection::supervisor::Supervisor;
use crate::connection::{ConnectionStatus, Connector, WsConnector};
use crate::error::ClientError;
use crate::error::command::CommandError;
use crate::lifecycle::{EventEmitter, LifecycleEvent};
use crate::pending::{Completion, Failure, Reply};
use crate::protocol::MessageId;

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Configures and starts a [`CommanderClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    default_error: DefaultErrorHandler,
    events: EventEmitter,
}

impl ClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            default_error: log_failure(),
            events: EventEmitter::new(),
        }
    }

    /// Receives failures that no command-level error handler takes,
    /// including panics raised inside other callbacks.
    pub fn default_error_handler(mut self, handler: impl Fn(Failure) + Send + Sync + 'static) -> Self {
        self.default_error = Arc::new(handler);
        self
    }

    /// Subscribe before starting so the first `Loading` is never missed.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Connect to the configured WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the configuration does not validate.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<(CommanderClient, ClientHandle), ClientError> {
        let endpoint = self.config.endpoint_url()?;
        self.start_with_connector(WsConnector::new(endpoint))
    }

    /// Start the supervisor over any [`Connector`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the configuration does not validate.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_with_connector<C: Connector>(
        self,
        connector: C,
    ) -> Result<(CommanderClient, ClientHandle), ClientError> {
        self.config.validate()?;

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let status = self.events.status();

        let supervisor = Supervisor::new(
            self.config,
            connector,
            commands_rx,
            self.events.clone(),
            shutdown.clone(),
        );
        let task = tokio::spawn(supervisor.run());

        let client = CommanderClient {
            commands,
            events: self.events,
            status,
            default_error: self.default_error,
        };

        Ok((client, ClientHandle { shutdown, task }))
    }
}

/// Submits commands to a commander server and routes their responses.
#[derive(Clone)]
pub struct CommanderClient {
    commands: mpsc::UnboundedSender<Submission>,
    events: EventEmitter,
    status: watch::Receiver<ConnectionStatus>,
    default_error: DefaultErrorHandler,
}

impl CommanderClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Start with the default error handler over WebSocket.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the configuration does not validate.
    pub fn start(config: ClientConfig) -> Result<(Self, ClientHandle), ClientError> {
        Self::builder(config).start()
    }

    /// Submit a command.
    ///
    /// The command is written as soon as a connection is open. Its handlers
    /// receive any number of progress notifications, then exactly one reply
    /// or failure. Returns the generated correlation id, which can be passed
    /// as a parent of follow-up commands.
    pub fn submit(&self, path: impl Into<String>, body: Value, options: SubmitOptions) -> MessageId {
        let path = path.into();
        let submission = normalise(path, body, options, Arc::clone(&self.default_error));
        let message_id = submission.message_id.clone();
        debug!("Submitting {} as {message_id}", submission.path);

        if let Err(mpsc::error::SendError(submission)) = self.commands.send(submission) {
            warn!(
                "Connection supervisor has stopped; failing {} ({message_id})",
                submission.path
            );
            let mut handlers = submission.handlers;
            handlers.deliver(&message_id, Completion::Error(CommandError::LostConnection));
        }

        message_id
    }

    /// Submit a command and wait for its terminal response.
    ///
    /// Progress handlers in `options` still run; reply and error handlers are
    /// replaced by the returned future.
    ///
    /// # Errors
    ///
    /// Returns the command's [`Failure`] if it did not succeed.
    pub async fn request(
        &self,
        path: impl Into<String>,
        body: Value,
        options: SubmitOptions,
    ) -> Result<Reply, Failure> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let original = options.original.clone();

        let reply_slot = Arc::clone(&slot);
        let options = options
            .on_reply(move |reply| complete(&reply_slot, Ok(reply)))
            .on_error(move |failure| complete(&slot, Err(failure)));

        let message_id = self.submit(path, body, options);

        rx.await.unwrap_or_else(|_| {
            Err(Failure {
                message_id,
                error: CommandError::LostConnection,
                original,
            })
        })
    }

    /// Lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch the connection status change.
    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

type Waiter = Arc<Mutex<Option<oneshot::Sender<Result<Reply, Failure>>>>>;

fn complete(slot: &Waiter, result: Result<Reply, Failure>) {
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(sender) = sender {
        // The caller may have stopped waiting.
        let _ = sender.send(result);
    }
}
