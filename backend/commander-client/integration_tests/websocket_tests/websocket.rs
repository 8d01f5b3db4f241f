use crate::websocket_tests::helpers::{fast_config, start_test_server, unused_endpoint};

use commander_client::{
    CommandError, CommanderClient, ConnectionFault, ErrorCode, LifecycleEvent, SubmitOptions,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for(events: &mut broadcast::Receiver<LifecycleEvent>, wanted: &LifecycleEvent) {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if &event == wanted => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for lifecycle event");
}

/// **VALUE**: Verifies a command round-trips through a real WebSocket server.
///
/// **WHY THIS MATTERS**: This is the client's whole purpose. Encoding, the
/// tungstenite transport and response routing all have to agree.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Frames sent as binary instead of text
/// - The `message_id` not surviving the round trip
/// - Replies read but never routed
#[tokio::test]
async fn given_running_server_when_echo_requested_then_reply_carries_body() {
    // GIVEN: A server and a connected client
    let server = start_test_server().await;
    let (client, handle) = CommanderClient::start(fast_config(server.endpoint())).expect("start");

    // WHEN: An echo command is sent
    let reply = timeout(
        WAIT,
        client.request("/v1/echo", json!({ "hello": "world" }), SubmitOptions::new()),
    )
    .await
    .expect("Timed out waiting for reply")
    .expect("echo succeeds");

    // THEN: The reply is the body
    assert_eq!(reply.data, json!({ "hello": "world" }));
    assert!(!client.status().is_loading());

    handle.shutdown().await.expect("shutdown");
}

/// **VALUE**: Verifies progress frames reach the progress handler before the reply.
#[tokio::test]
async fn given_progress_command_when_requested_then_progress_seen_before_reply() {
    let server = start_test_server().await;
    let (client, handle) = CommanderClient::start(fast_config(server.endpoint())).expect("start");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let options = SubmitOptions::new().on_progress(move |progress| {
        recorder.lock().expect("progress log").push(progress.progress);
    });

    let reply = timeout(WAIT, client.request("/v1/progress", json!({}), options))
        .await
        .expect("Timed out waiting for reply")
        .expect("progress command succeeds");

    assert_eq!(reply.data, json!("done"));
    assert_eq!(*seen.lock().expect("progress log"), vec![json!(1), json!(2)]);

    handle.shutdown().await.expect("shutdown");
}

/// **VALUE**: Verifies application errors from the server reach the caller as failures.
#[tokio::test]
async fn given_failing_command_when_requested_then_application_failure() {
    let server = start_test_server().await;
    let (client, handle) = CommanderClient::start(fast_config(server.endpoint())).expect("start");

    let failure = timeout(WAIT, client.request("/v1/error", json!({}), SubmitOptions::new()))
        .await
        .expect("Timed out waiting for failure")
        .expect_err("command fails");

    assert_eq!(
        failure.error,
        CommandError::Application {
            namespace: "test".to_string(),
            msg: json!("boom"),
        }
    );

    handle.shutdown().await.expect("shutdown");
}

/// **VALUE**: Verifies a server-side close fails in-flight commands and the client reconnects.
///
/// **WHY THIS MATTERS**: Servers restart. The client has to notice, tell callers
/// their commands are lost and come back without the application doing anything.
///
/// **BUG THIS CATCHES**: Would catch:
/// - A close frame not ending the generation
/// - Silent commands left pending forever
/// - No reconnect after the connection drops
#[tokio::test]
async fn given_server_closes_when_command_pending_then_lost_connection_and_reconnect() {
    // GIVEN: A connected client with a command the server will never answer
    let server = start_test_server().await;
    let builder = CommanderClient::builder(fast_config(server.endpoint()));
    let mut events = builder.subscribe();
    let (client, handle) = builder.start().expect("start");
    wait_for(&mut events, &LifecycleEvent::Connected).await;

    let (lost_tx, mut lost) = mpsc::unbounded_channel();
    client.submit(
        "/v1/silent",
        json!({}),
        SubmitOptions::new().on_error(move |failure| {
            let _ = lost_tx.send(failure);
        }),
    );

    // WHEN: The server closes the connection
    client.submit("/v1/close", json!({}), SubmitOptions::new());

    // THEN: The silent command fails with LostConnection
    let failure = timeout(WAIT, lost.recv())
        .await
        .expect("Timed out waiting for failure")
        .expect("failure delivered");
    assert_eq!(failure.error, CommandError::LostConnection);

    // THEN: The client reports the loss, reconnects and keeps working
    wait_for(
        &mut events,
        &LifecycleEvent::Error(ConnectionFault::new(ErrorCode::ServerWentAway)),
    )
    .await;
    wait_for(&mut events, &LifecycleEvent::Connected).await;
    assert_eq!(server.connection_count(), 2);

    let reply = timeout(WAIT, client.request("/v1/echo", json!(7), SubmitOptions::new()))
        .await
        .expect("Timed out waiting for reply")
        .expect("echo after reconnect");
    assert_eq!(reply.data, json!(7));

    handle.shutdown().await.expect("shutdown");
}

/// **VALUE**: Verifies an unreachable endpoint is reported as FailedToConnected.
#[tokio::test]
async fn given_unreachable_endpoint_when_started_then_failed_to_connect() {
    let builder = CommanderClient::builder(fast_config(unused_endpoint().await));
    let mut events = builder.subscribe();
    let (client, handle) = builder.start().expect("start");

    wait_for(
        &mut events,
        &LifecycleEvent::Error(ConnectionFault::new(ErrorCode::FailedToConnected)),
    )
    .await;

    let status = client.status();
    assert!(status.is_disabled());
    assert_eq!(
        status.error().map(|fault| fault.error_code),
        Some(ErrorCode::FailedToConnected)
    );

    handle.shutdown().await.expect("shutdown");
}
