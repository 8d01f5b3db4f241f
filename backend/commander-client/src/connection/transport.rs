//! Duplex transport seam and its WebSocket implementation.
//!
//! The supervisor only needs four things from a connection: write a text
//! frame, read the next text frame, know whether writing is currently
//! possible, and close. [`Connector`] opens one [`Transport`] per generation.

use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

/// One open duplex connection.
pub trait Transport: Send {
    /// Whether a frame written now would be handed to the peer.
    fn is_writable(&self) -> bool;

    /// Write one text frame.
    fn send(&mut self, frame: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the next text frame, or `None` once the connection has closed.
    ///
    /// Must be cancel safe: the supervisor polls it inside `select!`.
    fn recv(&mut self) -> impl Future<Output = Option<String>> + Send;

    /// Close the connection from this side.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports to one endpoint.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Connects to a `ws://` or `wss://` endpoint with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self) -> Result<WsTransport, TransportError> {
        debug!("Opening websocket to {}", self.endpoint);

        let (stream, response) =
            connect_async(self.endpoint.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    message: format!("Failed to connect to {}: {e}", self.endpoint),
                    location: ErrorLocation::from(Location::caller()),
                })?;

        info!(
            "Websocket to {} opened (HTTP {})",
            self.endpoint,
            response.status()
        );

        Ok(WsTransport { stream, open: true })
    }
}

/// A client WebSocket stream plus whether it is still usable.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
}

impl Transport for WsTransport {
    fn is_writable(&self) -> bool {
        self.open
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        trace!("-> {frame}");

        if let Err(e) = self.stream.send(Message::Text(frame.into())).await {
            self.open = false;
            return Err(TransportError::Send {
                message: format!("Failed to write frame: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<String> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    trace!("<- {}", text.as_str());
                    return Some(text.to_string());
                }
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(text),
                    Err(e) => warn!("Ignoring binary frame that is not UTF-8: {e}"),
                },
                Ok(Message::Close(frame)) => {
                    info!("Server closed the websocket: {frame:?}");
                    self.open = false;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    let error = TransportError::from(e);
                    warn!("Websocket read failed: {error}");
                    self.open = false;
                    return None;
                }
            }
        }

        self.open = false;
        None
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing websocket: {e}");
        }
    }
}
