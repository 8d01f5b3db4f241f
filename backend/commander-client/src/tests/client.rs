// Unit tests for the public submission API
// Covers the awaitable request form, callback isolation, the default error
// handler and correlation id chains.

use crate::client::{CommanderClient, DefaultErrorHandler};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::error::command::CommandError;
use crate::pending::Failure;
use crate::protocol::MessageId;
use crate::tests::mock::{Harness, Script, recording_options};
use crate::SubmitOptions;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

fn forwarding_handler() -> (DefaultErrorHandler, mpsc::UnboundedReceiver<Failure>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: DefaultErrorHandler = Arc::new(move |failure| {
        let _ = tx.send(failure);
    });
    (handler, rx)
}

/// **VALUE**: Verifies `request` resolves to the reply of the command it submitted.
#[tokio::test(start_paused = true)]
async fn given_connected_client_when_request_answered_then_returns_reply() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;
    let client = harness.client.clone();

    let pending = tokio::spawn(async move {
        client
            .request("/v1/lifx/status", json!({}), SubmitOptions::new())
            .await
    });
    let frame = server.next_command().await;
    server.reply(&frame["message_id"], json!({ "result": { "on": true } }));

    let reply = pending.await.expect("task").expect("reply");
    assert_eq!(reply.data, json!({ "on": true }));
}

/// **VALUE**: Verifies server-side handler errors surface as application failures.
///
/// **BUG THIS CATCHES**: Would catch the `error` envelope being read as a reply.
#[tokio::test(start_paused = true)]
async fn given_application_error_when_request_answered_then_returns_failure() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;
    let client = harness.client.clone();

    let pending = tokio::spawn(async move {
        client
            .request(
                "/v1/lifx/command",
                json!({}),
                SubmitOptions::new().original(json!("ctx")),
            )
            .await
    });
    let frame = server.next_command().await;
    server.send(json!({
        "message_id": frame["message_id"],
        "error": { "namespace": "lifx", "msg": "Unknown command" },
    }));

    let failure = pending.await.expect("task").expect_err("failure");
    assert_eq!(
        failure.error,
        CommandError::Application {
            namespace: "lifx".to_string(),
            msg: json!("Unknown command"),
        }
    );
    assert_eq!(failure.error.namespace(), "lifx");
    assert_eq!(failure.original, Some(json!("ctx")));
}

/// **VALUE**: Verifies a panicking reply handler is reported to the default error handler.
///
/// **WHY THIS MATTERS**: Callbacks run on the supervisor's task. A panic there
/// must not take the connection down with it.
///
/// **BUG THIS CATCHES**: Would catch an unguarded callback unwinding through the
/// event loop, which would stop every later command from completing.
#[tokio::test(start_paused = true)]
async fn given_panicking_reply_handler_when_reply_arrives_then_default_handler_gets_internal_error() {
    // GIVEN: A client with a forwarding default error handler
    let (handler, mut unhandled) = forwarding_handler();
    let mut harness = Harness::start_with(ClientConfig::default(), &[Script::Accept], Some(handler));
    let mut server = harness.accepted().await;

    // WHEN: The reply handler panics
    let message_id = harness.client.submit(
        "/v1/explode",
        json!({}),
        SubmitOptions::new().on_reply(|_| panic!("handler exploded")),
    );
    let frame = server.next_command().await;
    server.reply(&frame["message_id"], json!({ "result": 1 }));

    // THEN: The default handler receives an INTERNAL_ERROR for that command
    let failure = unhandled.recv().await.expect("unhandled failure");
    assert_eq!(failure.message_id, message_id);
    assert_eq!(failure.error.error_code(), Some("INTERNAL_ERROR"));
    assert_eq!(
        failure.error,
        CommandError::Internal {
            message: "handler exploded".to_string()
        }
    );

    // THEN: The connection keeps serving commands
    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/after", json!({}), options);
    let frame = server.next_command().await;
    server.reply(&frame["message_id"], json!({ "result": 2 }));
    assert_eq!(delivered.recv().await.expect("reply").into_reply().data, json!(2));
}

/// **VALUE**: Verifies failures of commands without an error handler reach the default handler.
#[tokio::test(start_paused = true)]
async fn given_no_error_handler_when_command_times_out_then_default_handler_notified() {
    let (handler, mut unhandled) = forwarding_handler();
    let mut harness = Harness::start_with(ClientConfig::default(), &[Script::Accept], Some(handler));
    let _server = harness.accepted().await;

    harness.client.submit(
        "/v1/lifx/command",
        json!({}),
        SubmitOptions::new().timeout(Duration::from_millis(300)),
    );

    let failure = unhandled.recv().await.expect("unhandled failure");
    assert_eq!(failure.error, CommandError::Timedout);
}

/// **VALUE**: Verifies follow-up commands carry their parents' ids ahead of a fresh one.
///
/// **BUG THIS CATCHES**: Would catch array ids being stringified on the wire or
/// not matched when the server echoes them back.
#[tokio::test(start_paused = true)]
async fn given_parent_ids_when_submitted_then_chain_sent_and_reply_routed() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    let message_id = harness.client.submit(
        "/v1/child",
        json!({}),
        options.parent_correlation_ids(vec!["root".to_string(), "mid".to_string()]),
    );

    let frame = server.next_command().await;
    let ids = frame["message_id"].as_array().expect("array id");
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "root");
    assert_eq!(ids[1], "mid");
    assert_eq!(message_id.parents(), ["root".to_string(), "mid".to_string()]);
    assert_eq!(ids[2], message_id.leaf());

    server.reply(&frame["message_id"], json!({ "result": "child done" }));
    let reply = delivered.recv().await.expect("reply").into_reply();
    assert!(matches!(reply.message_id, MessageId::Chain(_)));
    assert_eq!(reply.message_id, message_id);
}

/// **VALUE**: Verifies a client cannot start against a non-WebSocket endpoint.
#[tokio::test]
async fn given_http_endpoint_when_start_then_config_error() {
    let config = ClientConfig::with_endpoint("http://127.0.0.1:6100/v1/ws");

    let result = CommanderClient::start(config);

    assert!(matches!(result, Err(ClientError::Config(_))));
}
