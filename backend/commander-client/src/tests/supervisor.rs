// Unit tests for the connection supervisor
// Drives connect, serve, teardown and reconnect over an in-memory transport
// with the Tokio clock paused, so every deadline is exact.

use crate::config::ClientConfig;
use crate::error::command::CommandError;
use crate::lifecycle::LifecycleEvent;
use crate::protocol::ErrorCode;
use crate::tests::mock::{Delivered, Harness, Script, assert_quiet, fault, recording_options};

use std::time::Duration;

use serde_json::json;
use tokio::time::{Instant, sleep};

// ============================================
// CORRELATION AND TIMEOUTS
// ============================================

/// **VALUE**: Verifies a reply that beats its deadline is delivered once and its timer never fires.
///
/// **WHY THIS MATTERS**: Every command races a reply against a timeout. The reply
/// must win cleanly; a stale timer firing later would report a failure for a
/// command the caller already saw succeed.
///
/// **BUG THIS CATCHES**: Would catch if resolving a request forgot to cancel its
/// timer, or if the reply handler could be invoked twice.
#[tokio::test(start_paused = true)]
async fn given_reply_at_200ms_when_deadline_passes_then_only_reply_is_delivered() {
    // GIVEN: A connected client
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    // WHEN: A command is submitted with the default timeout and answered at 200 ms
    let (options, mut delivered) = recording_options();
    harness.client.submit(
        "/v1/lifx/command",
        json!({ "command": "highlight" }),
        options,
    );
    let frame = server.next_command().await;
    assert_eq!(frame["path"], "/v1/lifx/command");
    assert_eq!(frame["body"], json!({ "command": "highlight" }));

    sleep(Duration::from_millis(200)).await;
    server.reply(&frame["message_id"], json!({ "result": "ok" }));

    // THEN: The reply arrives once and nothing follows past the 5000 ms deadline
    let reply = delivered.recv().await.expect("reply").into_reply();
    assert_eq!(reply.data, json!("ok"));
    assert_eq!(reply.message_id.to_string(), frame["message_id"].as_str().unwrap());
    assert_quiet(&mut delivered, Duration::from_secs(10)).await;
}

/// **VALUE**: Verifies an unanswered command fails with Timedout and a late reply is dropped.
///
/// **WHY THIS MATTERS**: After a timeout the caller has moved on. A reply that
/// straggles in afterwards must not resurrect the command.
///
/// **BUG THIS CATCHES**: Would catch if expiry left the entry in the table, so a
/// late reply could still reach the handlers.
#[tokio::test(start_paused = true)]
async fn given_no_reply_when_timeout_elapses_then_timedout_and_late_reply_ignored() {
    // GIVEN: A connected client and a command with a 1000 ms timeout
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let started = Instant::now();
    let (options, mut delivered) = recording_options();
    harness.client.submit(
        "/v1/lifx/command",
        json!({}),
        options.timeout(Duration::from_millis(1000)),
    );
    let frame = server.next_command().await;

    // WHEN: The server stays silent
    let failure = delivered.recv().await.expect("failure").into_failure();

    // THEN: The command fails with Timedout at its deadline
    assert_eq!(failure.error, CommandError::Timedout);
    assert!(started.elapsed() >= Duration::from_millis(1000));

    // THEN: A late reply reaches nobody and the connection stays up
    server.reply(&frame["message_id"], json!({ "result": "late" }));
    assert_quiet(&mut delivered, Duration::from_secs(1)).await;
    assert!(!harness.client.status().is_loading());
}

/// **VALUE**: Verifies back-to-back commands get distinct ids and are written in submission order.
///
/// **WHY THIS MATTERS**: Servers may rely on the order commands arrive within
/// one connection. Ids must never collide or responses would be misrouted.
///
/// **BUG THIS CATCHES**: Would catch a sender that reorders its queue or an id
/// generator that repeats.
#[tokio::test(start_paused = true)]
async fn given_two_commands_when_submitted_back_to_back_then_written_in_order_with_distinct_ids() {
    // GIVEN: A connected client
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    // WHEN: Two commands are submitted without yielding in between
    let first = harness
        .client
        .submit("/v1/first", json!(1), Default::default());
    let second = harness
        .client
        .submit("/v1/second", json!(2), Default::default());

    // THEN: They are written in that order, carrying the ids submit returned
    let frame_one = server.next_command().await;
    let frame_two = server.next_command().await;
    assert_eq!(frame_one["path"], "/v1/first");
    assert_eq!(frame_two["path"], "/v1/second");
    assert_eq!(frame_one["message_id"], json!(first.to_string()));
    assert_eq!(frame_two["message_id"], json!(second.to_string()));
    assert_ne!(first, second);
}

/// **VALUE**: Verifies responses are routed by id, not by arrival order.
///
/// **BUG THIS CATCHES**: Would catch a receiver that resolves the oldest pending
/// request instead of looking the id up.
#[tokio::test(start_paused = true)]
async fn given_two_pending_commands_when_replies_arrive_reversed_then_each_gets_its_own() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (first_options, mut first) = recording_options();
    let (second_options, mut second) = recording_options();
    harness.client.submit("/v1/a", json!({}), first_options);
    harness.client.submit("/v1/b", json!({}), second_options);
    let frame_a = server.next_command().await;
    let frame_b = server.next_command().await;

    server.reply(&frame_b["message_id"], json!({ "result": "b" }));
    server.reply(&frame_a["message_id"], json!({ "result": "a" }));

    assert_eq!(first.recv().await.expect("a").into_reply().data, json!("a"));
    assert_eq!(second.recv().await.expect("b").into_reply().data, json!("b"));
}

/// **VALUE**: Verifies progress notifications precede the terminal reply on the same command.
///
/// **WHY THIS MATTERS**: Long-running commands report progress. Progress must
/// not be mistaken for completion or the real reply would be dropped.
///
/// **BUG THIS CATCHES**: Would catch if a progress frame removed the pending entry.
#[tokio::test(start_paused = true)]
async fn given_progress_frames_when_reply_follows_then_progress_then_reply_delivered() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit(
        "/v1/scan",
        json!({}),
        options.original(json!({ "button": "scan" })),
    );
    let frame = server.next_command().await;

    server.reply(&frame["message_id"], json!({ "progress": 10 }));
    server.reply(&frame["message_id"], json!({ "progress": 90 }));
    server.reply(&frame["message_id"], json!({ "result": "done" }));

    let mut progress = Vec::new();
    for _ in 0..2 {
        match delivered.recv().await.expect("progress") {
            Delivered::Progress(p) => {
                assert_eq!(p.original, Some(json!({ "button": "scan" })));
                progress.push(p.progress);
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }
    assert_eq!(progress, vec![json!(10), json!(90)]);

    let reply = delivered.recv().await.expect("reply").into_reply();
    assert_eq!(reply.data, json!("done"));
    assert_eq!(reply.original, Some(json!({ "button": "scan" })));
}

/// **VALUE**: Verifies progress arriving after the terminal reply is dropped.
///
/// **WHY THIS MATTERS**: Progress may repeat before the terminal outcome but
/// never after it. A caller that already saw the reply must not be told the
/// command is still running.
///
/// **BUG THIS CATCHES**: Would catch a table that keeps completed entries
/// around for progress, or a receiver that routes progress without a lookup.
#[tokio::test(start_paused = true)]
async fn given_completed_command_when_progress_arrives_late_then_it_is_dropped() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/scan", json!({}), options);
    let frame = server.next_command().await;

    server.reply(&frame["message_id"], json!({ "result": "done" }));
    let reply = delivered.recv().await.expect("reply").into_reply();
    assert_eq!(reply.data, json!("done"));

    server.reply(&frame["message_id"], json!({ "progress": 100 }));

    assert_quiet(&mut delivered, Duration::from_secs(10)).await;
}

/// **VALUE**: Verifies a reply carrying an error_code becomes a failure with the other fields kept.
///
/// **BUG THIS CATCHES**: Would catch a classifier that treats any reply as success.
#[tokio::test(start_paused = true)]
async fn given_error_code_reply_when_routed_then_remote_failure_with_details() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/lifx/command", json!({}), options);
    let frame = server.next_command().await;
    server.reply(
        &frame["message_id"],
        json!({ "error_code": "NO_SUCH_DEVICE", "error": "No light named porch" }),
    );

    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error.error_code(), Some("NO_SUCH_DEVICE"));
    assert_eq!(failure.error.to_json()["error"], "No light named porch");
    assert!(!failure.error.is_synthesized());
}

/// **VALUE**: Verifies heartbeats and garbage frames are dropped without disturbing pending commands.
///
/// **WHY THIS MATTERS**: The server sends `__tick__` frames and may send frames
/// the client cannot parse. Neither may end the connection or resolve anything.
///
/// **BUG THIS CATCHES**: Would catch a receiver that looks `__tick__` up in the
/// table or gives up on the connection after a bad frame.
#[tokio::test(start_paused = true)]
async fn given_tick_and_malformed_frames_when_received_then_ignored() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/slow", json!({}), options);
    let frame = server.next_command().await;

    server.send(json!({ "message_id": "__tick__" }));
    server.send(json!("not an object"));
    server.send(json!({ "reply": { "result": 1 } }));
    server.send(json!({ "message_id": "someone-else", "reply": { "result": 1 } }));
    server.send(json!({ "message_id": frame["message_id"] }));
    assert_quiet(&mut delivered, Duration::from_millis(500)).await;

    server.reply(&frame["message_id"], json!({ "result": "still here" }));
    let reply = delivered.recv().await.expect("reply").into_reply();
    assert_eq!(reply.data, json!("still here"));
}

// ============================================
// CONNECTION LIFECYCLE
// ============================================

/// **VALUE**: Verifies a dropped connection fails pending commands before the next attempt starts.
///
/// **WHY THIS MATTERS**: Requests belong to the connection they were sent on.
/// Once it is gone the server will never answer them, and callers must learn
/// that before the client moves on to a new connection.
///
/// **BUG THIS CATCHES**: Would catch teardown that leaves entries behind, or a
/// reconnect that starts before they are resolved.
#[tokio::test(start_paused = true)]
async fn given_pending_command_when_server_closes_then_lost_connection_before_reconnect() {
    // GIVEN: A connected client with one unanswered command
    let mut harness = Harness::start(&[Script::Accept, Script::Accept]);
    assert_eq!(harness.next_event().await, LifecycleEvent::Loading);
    assert_eq!(harness.next_event().await, LifecycleEvent::Connected);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/slow", json!({}), options);
    server.next_command().await;

    // WHEN: The server closes the connection
    server.close();

    // THEN: The command fails with LostConnection while only one attempt has been made
    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::LostConnection);
    assert_eq!(harness.connector.attempts().len(), 1);

    // THEN: The client reports the loss and reconnects
    assert_eq!(harness.next_event().await, fault(ErrorCode::ServerWentAway));
    assert!(harness.client.status().is_disabled());
    assert_eq!(harness.next_event().await, LifecycleEvent::Loading);
    assert_eq!(harness.next_event().await, LifecycleEvent::Connected);
    assert_eq!(harness.connector.attempts().len(), 2);
    assert!(!harness.client.status().is_disabled());
}

/// **VALUE**: Verifies a handshake that never completes is abandoned after the connect timeout.
///
/// **WHY THIS MATTERS**: Without a deadline a half-open server would leave the
/// client stuck in Loading forever with every command queued behind it.
///
/// **BUG THIS CATCHES**: Would catch a missing connect timeout, or commands
/// submitted during the attempt not being failed when it is abandoned.
#[tokio::test(start_paused = true)]
async fn given_hanging_handshake_when_2000ms_pass_then_failed_to_connect() {
    // GIVEN: A server that never completes the handshake
    let started = Instant::now();
    let mut harness = Harness::start(&[Script::Hang]);
    assert_eq!(harness.next_event().await, LifecycleEvent::Loading);

    // WHEN: A command is submitted while connecting
    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/lifx/command", json!({}), options);

    // THEN: The attempt fails at the connect timeout
    assert_eq!(harness.next_event().await, fault(ErrorCode::FailedToConnected));
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert!(started.elapsed() < Duration::from_millis(2100));

    // THEN: The command registered during the attempt is lost with it
    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::LostConnection);

    let status = harness.client.status();
    assert!(status.is_loading());
    assert_eq!(
        status.error_str(),
        Some("FailedToConnected: Could not connect to server")
    );
}

/// **VALUE**: Verifies an instantly refused attempt still occupies the retry floor.
///
/// **WHY THIS MATTERS**: A server that refuses immediately would otherwise be
/// hammered in a tight loop.
///
/// **BUG THIS CATCHES**: Would catch the floor being skipped on fast failures.
#[tokio::test(start_paused = true)]
async fn given_instant_refusal_when_retrying_then_attempts_are_at_least_1000ms_apart() {
    let config = ClientConfig {
        reconnect_delay_ms: 1,
        ..ClientConfig::default()
    };
    let mut harness = Harness::start_with(config, &[Script::Refuse, Script::Refuse], None);

    harness.wait_for(&fault(ErrorCode::FailedToConnected)).await;
    harness.wait_for(&fault(ErrorCode::FailedToConnected)).await;

    let attempts = harness.connector.attempts();
    assert!(attempts.len() >= 2);
    let gap = attempts[1] - attempts[0];
    assert!(gap >= Duration::from_millis(1000), "gap was {gap:?}");
    assert!(gap < Duration::from_millis(1100), "gap was {gap:?}");
}

/// **VALUE**: Verifies commands submitted while disconnected are sent once a connection opens.
///
/// **BUG THIS CATCHES**: Would catch commands being dropped when no generation is live.
#[tokio::test(start_paused = true)]
async fn given_refused_attempt_when_command_submitted_during_backoff_then_sent_on_reconnect() {
    let mut harness = Harness::start(&[Script::Refuse, Script::Accept]);
    harness.wait_for(&fault(ErrorCode::FailedToConnected)).await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/queued", json!({}), options);

    let mut server = harness.accepted().await;
    let frame = server.next_command().await;
    assert_eq!(frame["path"], "/v1/queued");
    server.reply(&frame["message_id"], json!({ "result": true }));
    assert_eq!(delivered.recv().await.expect("reply").into_reply().data, json!(true));
}

/// **VALUE**: Verifies a command written to a dead socket fails with InactiveConnection.
///
/// **BUG THIS CATCHES**: Would catch the sender silently discarding frames or
/// retrying them forever.
#[tokio::test(start_paused = true)]
async fn given_unwritable_socket_when_command_flushed_then_inactive_connection() {
    let mut harness = Harness::start(&[Script::Accept]);
    let server = harness.accepted().await;
    server.stall_writes();

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/lifx/command", json!({}), options);

    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::InactiveConnection);
}

/// **VALUE**: Verifies the client sends keepalive ticks while connected.
#[tokio::test(start_paused = true)]
async fn given_idle_connection_when_heartbeat_interval_passes_then_tick_sent() {
    let started = Instant::now();
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let frame = server.next_frame().await;

    assert_eq!(frame, json!({ "path": "__tick__" }));
    assert!(started.elapsed() >= Duration::from_millis(15_000));
}

/// **VALUE**: Verifies the server clock is surfaced as a lifecycle event.
#[tokio::test(start_paused = true)]
async fn given_server_time_frame_when_received_then_event_emitted() {
    let mut harness = Harness::start(&[Script::Accept]);
    let server = harness.accepted().await;
    harness.wait_for(&LifecycleEvent::Connected).await;

    server.send(json!({ "message_id": "__server_time__", "reply": 1_700_000_000 }));

    assert_eq!(
        harness.next_event().await,
        LifecycleEvent::ServerTime(json!(1_700_000_000))
    );
}

/// **VALUE**: Verifies shutdown resolves everything pending and stops the supervisor.
///
/// **WHY THIS MATTERS**: An application exiting must not leave callers waiting
/// on commands that will never complete.
///
/// **BUG THIS CATCHES**: Would catch a shutdown path that skips teardown, or a
/// client that still accepts work after stopping.
#[tokio::test(start_paused = true)]
async fn given_pending_command_when_shutdown_then_lost_connection_and_later_submits_fail() {
    let mut harness = Harness::start(&[Script::Accept]);
    let mut server = harness.accepted().await;

    let (options, mut delivered) = recording_options();
    harness.client.submit("/v1/slow", json!({}), options);
    server.next_command().await;

    let Harness { client, handle, .. } = harness;
    handle.shutdown().await.expect("clean shutdown");

    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::LostConnection);

    let (options, mut after) = recording_options();
    client.submit("/v1/too-late", json!({}), options);
    let failure = after.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::LostConnection);
}

/// **VALUE**: Verifies a command still queued when the client shuts down fails with LostConnection.
///
/// **WHY THIS MATTERS**: Commands submitted during backoff wait in the queue
/// for the next connection attempt. If shutdown comes first that attempt never
/// happens, and the caller must still get a terminal outcome.
///
/// **BUG THIS CATCHES**: Would catch shutdown dropping buffered submissions
/// together with the queue, leaving their handlers silent forever.
#[tokio::test(start_paused = true)]
async fn given_command_queued_during_backoff_when_shutdown_then_lost_connection() {
    // GIVEN: A client backing off after a refused attempt
    let mut harness = Harness::start(&[Script::Refuse]);
    harness.wait_for(&fault(ErrorCode::FailedToConnected)).await;

    // WHEN: A command is queued and the client shuts down before reconnecting
    let (options, mut delivered) = recording_options();
    let message_id = harness.client.submit("/v1/queued", json!({}), options);

    let Harness { handle, connector, .. } = harness;
    handle.shutdown().await.expect("clean shutdown");

    // THEN: The queued command fails exactly once and no attempt was made for it
    let failure = delivered.recv().await.expect("failure").into_failure();
    assert_eq!(failure.error, CommandError::LostConnection);
    assert_eq!(failure.message_id, message_id);
    assert_quiet(&mut delivered, Duration::from_secs(10)).await;
    assert_eq!(connector.attempts().len(), 1);
}
