//! Connection lifecycle events broadcast to the application.
//!
//! Events are advisory: they describe what the supervisor is doing but never
//! require the application to act. The latest state is also folded into a
//! [`ConnectionStatus`] snapshot for consumers that only care about "now".

use crate::connection::ConnectionStatus;
use crate::protocol::ErrorCode;

use std::fmt::{Display, Formatter, Result as FormatResult};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Starting to open a connection.
    Loading,
    /// Successfully connected.
    Connected,
    /// Connecting failed or the connection went away.
    Error(ConnectionFault),
    /// The server published its clock.
    ServerTime(Value),
}

/// Reason carried by [`LifecycleEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionFault {
    pub error_code: ErrorCode,
    pub error: String,
}

impl ConnectionFault {
    pub fn new(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            error: error_code.description().to_string(),
        }
    }
}

impl Display for ConnectionFault {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}: {}", self.error_code, self.error)
    }
}

/// Publishes lifecycle events and keeps the status snapshot in step.
#[derive(Clone)]
pub(crate) struct EventEmitter {
    events: broadcast::Sender<LifecycleEvent>,
    status: watch::Sender<ConnectionStatus>,
}

impl EventEmitter {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self { events, status }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub(crate) fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::Loading => info!("Starting to open connection"),
            LifecycleEvent::Connected => info!("Successfully connected to the websocket"),
            LifecycleEvent::Error(fault) => warn!("Connection error: {fault}"),
            LifecycleEvent::ServerTime(time) => debug!("Got a new server time: {time}"),
        }

        self.status.send_modify(|status| status.apply(&event));

        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}
