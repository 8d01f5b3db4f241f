mod error {
    mod location;
}

mod websocket_tests {
    pub mod helpers;
    mod websocket;
}
