use commander_client::error::{ConfigError, TransportError};
use commander_client::ClientConfig;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies that `TransportError` includes file/line location tracking.
///
/// **WHY THIS MATTERS**: Connection failures surface in logs far from where the
/// attempt was made. The location tells developers which code path opened,
/// wrote or read the socket.
///
/// **BUG THIS CATCHES**: Would catch if someone removes the location field from
/// the error Display implementation.
#[test]
#[track_caller]
fn given_transport_error_when_formatted_then_includes_location() {
    // GIVEN: A Connect error with location
    let location = ErrorLocation::from(Location::caller());
    let err = TransportError::Connect {
        message: "connection refused".to_string(),
        location,
    };

    // WHEN: Error is formatted
    let formatted = err.to_string();

    // THEN: Message and location are both present
    assert!(formatted.contains("Connect Error: connection refused"));
    assert!(formatted.contains("location.rs"), "got: {formatted}");
}

/// **VALUE**: Verifies config validation errors point at the validating code.
///
/// **BUG THIS CATCHES**: Would catch a validation error built without a location.
#[test]
fn given_invalid_endpoint_when_validated_then_error_has_message_and_location() {
    let config = ClientConfig::with_endpoint("http://127.0.0.1:6100");

    let err = config.validate().expect_err("http is not a websocket scheme");

    assert!(matches!(err, ConfigError::ValidationError { .. }));
    let formatted = err.to_string();
    assert!(formatted.contains("Invalid endpoint scheme: http"));
    assert!(formatted.contains("config"), "got: {formatted}");
}
