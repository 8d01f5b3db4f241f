//! One-shot command execution: connect, submit, print, shut down.

use crate::error::CommanderError;

use commander_client::{ClientConfig, CommanderClient, LifecycleEvent, SubmitOptions};

use common::ErrorLocation;

use std::panic::Location;

use log::{info, warn};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

pub const USAGE: &str = "usage: commander <path> [json-body]";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub path: String,
    pub body: Value,
}

/// How the command ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Replied(Value),
    Failed(Value),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Replied(_))
    }

    /// The JSON line printed for this outcome.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Replied(data) => json!({ "reply": data }),
            Outcome::Failed(error) => json!({ "error": error }),
        }
    }
}

/// Parse `<path> [json-body]` (program name already stripped).
///
/// A body that is not valid JSON is sent as a string. A missing body is `{}`.
///
/// # Errors
///
/// Returns [`CommanderError::Usage`] if the path is missing or there are
/// extra arguments.
pub fn parse_args<I>(args: I) -> Result<Invocation, CommanderError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();

    let path = args.next().ok_or_else(|| CommanderError::Usage {
        message: USAGE.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let body = match args.next() {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => json!({}),
    };

    if let Some(extra) = args.next() {
        return Err(CommanderError::Usage {
            message: format!("Unexpected argument {extra:?}; {USAGE}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(Invocation { path, body })
}

/// Connect with `config`, run one command to completion and shut down.
///
/// Progress notifications are printed as they arrive.
///
/// # Errors
///
/// Returns [`CommanderError::Client`] if the client cannot start or stop.
/// A command that fails is an [`Outcome::Failed`], not an error.
pub async fn execute(config: ClientConfig, invocation: Invocation) -> Result<Outcome, CommanderError> {
    let builder = CommanderClient::builder(config);
    let mut events = builder.subscribe();
    let (client, handle) = builder.start().map_err(|e| CommanderError::Client {
        message: format!("Failed to start client: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LifecycleEvent::Error(fault)) => warn!("{fault}"),
                Ok(LifecycleEvent::ServerTime(time)) => info!("Server time: {time}"),
                Ok(event) => info!("{event:?}"),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {skipped} lifecycle event(s)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Sending {} {}", invocation.path, invocation.body);
    let options = SubmitOptions::new().on_progress(|progress| {
        println!("{}", json!({ "progress": progress.progress }));
    });
    let result = client.request(invocation.path, invocation.body, options).await;

    let outcome = match result {
        Ok(reply) => Outcome::Replied(reply.data),
        Err(failure) => {
            warn!("Command {} failed: {}", failure.message_id, failure.error);
            Outcome::Failed(failure.error.to_json())
        }
    };

    drop(client);
    let stopped = handle.shutdown().await.map_err(|e| CommanderError::Client {
        message: format!("Failed to stop client: {e}"),
        location: ErrorLocation::from(Location::caller()),
    });
    watcher.abort();
    stopped?;

    Ok(outcome)
}
