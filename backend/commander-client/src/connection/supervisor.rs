//! Connection supervisor.
//!
//! Drives `Connecting → Connected → Closing → backoff → Connecting …` until
//! shut down. Each pass creates one [`Generation`] and multiplexes everything
//! that happens under it on this single task with `tokio::select!`:
//!
//! - submitted commands (registered, then written by the sender)
//! - inbound frames (routed by the receiver)
//! - request deadlines (timeout supervisor)
//! - the heartbeat interval
//!
//! Because nothing is spawned per generation, returning from the loop is
//! enough to stop all of it; teardown then resolves whatever is left.

use crate::client::normalizer::Submission;
use crate::config::ClientConfig;
use crate::connection::generation::Generation;
use crate::connection::heartbeat::Heartbeat;
use crate::connection::receiver;
use crate::connection::transport::{Connector, Transport};
use crate::error::command::CommandError;
use crate::lifecycle::{ConnectionFault, EventEmitter, LifecycleEvent};
use crate::pending::Completion;
use crate::protocol::ErrorCode;

use backoff::backoff::{Backoff, Constant};
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

enum Attempt<T> {
    Open(T),
    Failed,
    Shutdown,
}

enum Outcome {
    Closed,
    FailedToConnect,
    Shutdown,
}

pub(crate) struct Supervisor<C: Connector> {
    config: ClientConfig,
    connector: C,
    commands: mpsc::UnboundedReceiver<Submission>,
    commands_open: bool,
    events: EventEmitter,
    shutdown: CancellationToken,
    backoff: Constant,
    generation: u64,
}

impl<C: Connector> Supervisor<C> {
    pub(crate) fn new(
        config: ClientConfig,
        connector: C,
        commands: mpsc::UnboundedReceiver<Submission>,
        events: EventEmitter,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = Constant::new(config.reconnect_delay());
        Self {
            config,
            connector,
            commands,
            commands_open: true,
            events,
            shutdown,
            backoff,
            generation: 0,
        }
    }

    /// Run until the shutdown token is cancelled.
    pub(crate) async fn run(mut self) {
        info!("Connection supervisor started for {}", self.config.endpoint);

        loop {
            match self.run_generation().await {
                Outcome::Shutdown => break,
                Outcome::Closed | Outcome::FailedToConnect => {}
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        self.reject_queued();

        info!(
            "Connection supervisor stopped after {} generation(s)",
            self.generation
        );
    }

    /// Close the command queue and fail whatever is still buffered in it.
    /// Later submissions are refused by the closed channel.
    fn reject_queued(&mut self) {
        self.commands.close();

        let mut rejected = 0;
        while let Ok(Submission {
            message_id,
            mut handlers,
            ..
        }) = self.commands.try_recv()
        {
            handlers.deliver(&message_id, Completion::Error(CommandError::LostConnection));
            rejected += 1;
        }

        if rejected > 0 {
            info!("Rejected {rejected} queued command(s) on shutdown");
        }
    }

    async fn run_generation(&mut self) -> Outcome {
        self.generation += 1;
        let mut generation = Generation::new(self.generation, self.config.request_timeout());

        self.events.emit(LifecycleEvent::Loading);
        let started = Instant::now();

        let mut transport = match self.connect(&mut generation).await {
            Attempt::Open(transport) => transport,
            Attempt::Failed => {
                self.events
                    .emit(LifecycleEvent::Error(ConnectionFault::new(
                        ErrorCode::FailedToConnected,
                    )));
                generation.teardown();
                return self.respect_retry_floor(started).await;
            }
            Attempt::Shutdown => {
                generation.teardown();
                return Outcome::Shutdown;
            }
        };

        info!("Generation {} connected", generation.number());
        self.events.emit(LifecycleEvent::Connected);

        let outcome = self.serve(&mut generation, &mut transport).await;

        transport.close().await;
        self.events
            .emit(LifecycleEvent::Error(ConnectionFault::new(
                ErrorCode::ServerWentAway,
            )));
        generation.teardown();
        outcome
    }

    /// Open the transport within the connect timeout. Commands buffered
    /// during backoff, and any submitted meanwhile, are registered so their
    /// deadlines start running.
    async fn connect(&mut self, generation: &mut Generation) -> Attempt<C::Transport> {
        while let Ok(submission) = self.commands.try_recv() {
            generation.register(submission);
        }

        let connect_timeout = self.config.connect_timeout();
        let attempt = timeout(connect_timeout, self.connector.connect());
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Attempt::Shutdown,
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(transport)) => Attempt::Open(transport),
                        Ok(Err(e)) => {
                            error!("Failed to start websocket connection: {e}");
                            Attempt::Failed
                        }
                        Err(_) => {
                            error!("Timed out waiting for websocket after {connect_timeout:?}");
                            Attempt::Failed
                        }
                    };
                }
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(submission) => {
                        generation.register(submission);
                    }
                    None => self.commands_open = false,
                },
                Some(message_id) = generation.table.next_expired() => {
                    generation.table.expire(&message_id);
                }
            }
        }
    }

    /// Run a connected generation until the transport closes or shutdown.
    async fn serve(&mut self, generation: &mut Generation, transport: &mut C::Transport) -> Outcome {
        let mut heartbeat = Heartbeat::new(self.config.heartbeat_interval());

        generation
            .sender
            .flush(transport, &mut generation.table)
            .await;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Outcome::Shutdown,
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(submission) => {
                        generation.register(submission);
                    }
                    None => self.commands_open = false,
                },
                frame = transport.recv() => match frame {
                    Some(text) => receiver::route(&text, &mut generation.table, &self.events),
                    None => {
                        info!("Websocket for generation {} closed", generation.number());
                        return Outcome::Closed;
                    }
                },
                Some(message_id) = generation.table.next_expired() => {
                    generation.table.expire(&message_id);
                }
                _ = heartbeat.tick() => heartbeat.beat(transport).await,
            }

            generation
                .sender
                .flush(transport, &mut generation.table)
                .await;
        }
    }

    /// Stop a failing server from being hammered: an attempt that failed
    /// fast still occupies at least the retry floor.
    async fn respect_retry_floor(&mut self, started: Instant) -> Outcome {
        let floor = self.config.retry_floor();
        let elapsed = started.elapsed();
        if elapsed >= floor {
            return Outcome::FailedToConnect;
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => Outcome::Shutdown,
            _ = sleep(floor - elapsed) => Outcome::FailedToConnect,
        }
    }

    async fn wait_before_reconnect(&mut self) -> bool {
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or_else(|| self.config.reconnect_delay());
        debug!("Reconnecting in {delay:?}");

        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }
}
