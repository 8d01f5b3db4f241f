//! Test helpers for WebSocket integration tests.
//!
//! This module provides a small commander server on an ephemeral port:
//! - `/v1/echo` replies with the command body
//! - `/v1/progress` sends two progress frames, then a result
//! - `/v1/error` answers with an application error
//! - `/v1/silent` never answers
//! - `/v1/close` closes the connection
//!
//! Heartbeat frames are ignored.

use commander_client::ClientConfig;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct TestServer {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub fn endpoint(&self) -> String {
        format!("ws://{}/v1/ws", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Test helper: Start the scripted server on 127.0.0.1 with an OS-assigned port.
pub async fn start_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read local addr");
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&connections);
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(stream));
        }
    });

    TestServer {
        addr,
        connections,
        task,
    }
}

async fn serve_connection(stream: TcpStream) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let frame: Value = serde_json::from_str(text.as_str()).expect("client sent JSON");
        let message_id = frame["message_id"].clone();

        let replies = match frame["path"].as_str() {
            Some("/v1/echo") => vec![json!({ "message_id": message_id, "reply": { "result": frame["body"] } })],
            Some("/v1/progress") => vec![
                json!({ "message_id": message_id, "reply": { "progress": 1 } }),
                json!({ "message_id": message_id, "reply": { "progress": 2 } }),
                json!({ "message_id": message_id, "reply": { "result": "done" } }),
            ],
            Some("/v1/error") => vec![json!({
                "message_id": message_id,
                "error": { "namespace": "test", "msg": "boom" },
            })],
            Some("/v1/close") => {
                let _ = ws.close(None).await;
                return;
            }
            _ => Vec::new(),
        };

        for reply in replies {
            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                return;
            }
        }
    }
}

/// Test helper: Config with short timings pointed at `endpoint`.
pub fn fast_config(endpoint: String) -> ClientConfig {
    ClientConfig {
        connect_timeout_ms: 500,
        retry_floor_ms: 50,
        reconnect_delay_ms: 100,
        request_timeout_ms: 2_000,
        ..ClientConfig::with_endpoint(endpoint)
    }
}

/// Test helper: A local address nothing is listening on.
pub async fn unused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    format!("ws://{addr}/v1/ws")
}
