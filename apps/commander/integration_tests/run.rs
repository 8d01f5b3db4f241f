use commander::run::{Invocation, Outcome, execute};

use commander_client::ClientConfig;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(10);

/// Test helper: Serve one connection that echoes every command's body.
async fn start_echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind echo server");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let mut ws = accept_async(stream).await.expect("handshake");
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let frame: Value = serde_json::from_str(text.as_str()).expect("client sent JSON");
            let reply = json!({
                "message_id": frame["message_id"],
                "reply": { "result": frame["body"] },
            });
            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                return;
            }
        }
    });

    format!("ws://{addr}/v1/ws")
}

/// **VALUE**: Verifies the driver runs one command end to end and reports the reply.
///
/// **WHY THIS MATTERS**: This is what the binary does between parsing arguments
/// and printing; a regression here breaks every invocation.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The client not being shut down after the reply (the call would hang)
/// - The reply data not reaching the outcome
#[tokio::test]
async fn given_echo_server_when_execute_then_replied_with_body() {
    // GIVEN: A server that echoes bodies
    let endpoint = start_echo_server().await;

    // WHEN: Executing one command
    let outcome = timeout(
        WAIT,
        execute(
            ClientConfig::with_endpoint(endpoint),
            Invocation {
                path: "/v1/echo".to_string(),
                body: json!({ "n": 1 }),
            },
        ),
    )
    .await
    .expect("Timed out executing command")
    .expect("execute");

    // THEN: The outcome carries the echoed body
    assert_eq!(outcome, Outcome::Replied(json!({ "n": 1 })));
}

/// **VALUE**: Verifies an unreachable server becomes a failed outcome, not a hang.
///
/// **BUG THIS CATCHES**: Would catch a command submitted during a failed connect
/// never being resolved.
#[tokio::test]
async fn given_no_server_when_execute_then_failed_with_lost_connection() {
    // GIVEN: An address nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = ClientConfig {
        connect_timeout_ms: 500,
        retry_floor_ms: 50,
        reconnect_delay_ms: 50,
        request_timeout_ms: 1_000,
        ..ClientConfig::with_endpoint(format!("ws://{addr}/v1/ws"))
    };

    // WHEN: Executing a command
    let outcome = timeout(
        WAIT,
        execute(
            config,
            Invocation {
                path: "/v1/echo".to_string(),
                body: json!({}),
            },
        ),
    )
    .await
    .expect("Timed out executing command")
    .expect("execute");

    // THEN: It fails with one of the synthesized connection errors
    let Outcome::Failed(error) = outcome else {
        panic!("expected a failure, got {outcome:?}");
    };
    let code = error["error_code"].as_str().expect("error code");
    assert!(
        code == "LostConnection" || code == "Timedout",
        "unexpected error code {code}"
    );
}
