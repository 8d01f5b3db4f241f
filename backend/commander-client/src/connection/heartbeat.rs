use crate::connection::transport::Transport;
use crate::protocol::frame::encode_tick;

use std::time::Duration;

use log::{trace, warn};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Keepalive ticker for one generation.
///
/// The first tick is one full period after the connection opens.
pub(crate) struct Heartbeat {
    interval: Interval,
}

impl Heartbeat {
    pub(crate) fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub(crate) async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Send a tick frame if the transport is writable; otherwise do nothing.
    pub(crate) async fn beat<T: Transport>(&self, transport: &mut T) {
        if !transport.is_writable() {
            trace!("Skipping heartbeat: connection not writable");
            return;
        }

        if let Err(e) = transport.send(encode_tick()).await {
            warn!("Failed to send heartbeat: {e}");
        }
    }
}
