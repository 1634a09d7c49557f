//! Subscriber Loop
//!
//! A long-lived task that holds one dedicated pub/sub connection and forwards
//! messages from other users to a sink until the shutdown signal fires.
//!
//! States: `Connecting -> Subscribed -> Receiving -> {Stopped, Failed}`.
//! A failure at any point is terminal; there is no reconnection. On shutdown
//! the loop unsubscribes before it closes the connection.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use super::{Identity, MessageSink};
use crate::error::{ConnectionError, ServiceError};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::store::{Connector, Subscriber};

/// How long a single receive waits before the loop checks in again.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

// == Subscriber State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Subscribed,
    Receiving,
    Stopped,
    Failed,
}

impl SubscriberState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubscriberState::Stopped | SubscriberState::Failed)
    }
}

/// How the loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// Shutdown was requested
    Stopped,
    /// Dialing, subscribing, receiving or delivering failed
    Failed(ServiceError),
}

// == Subscriber Loop ==
pub struct SubscriberLoop<C: Connector, S: MessageSink> {
    connector: C,
    channel: String,
    identity: Identity,
    sink: S,
    receive_timeout: Duration,
    shutdown: ShutdownSignal,
    state: watch::Sender<SubscriberState>,
}

impl<C: Connector, S: MessageSink> SubscriberLoop<C, S> {
    pub fn new(
        connector: C,
        channel: impl Into<String>,
        identity: Identity,
        sink: S,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state, _) = watch::channel(SubscriberState::Connecting);
        Self {
            connector,
            channel: channel.into(),
            identity,
            sink,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            shutdown,
            state,
        }
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    /// Watches state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Runs the loop on a task tracked by the coordinator.
    pub fn spawn(self, coordinator: &ShutdownCoordinator) -> SubscriberHandle {
        let state = self.watch_state();
        let join = coordinator.spawn("subscriber", self.run());
        SubscriberHandle { state, join }
    }

    // == Run ==
    /// Drives the loop to a terminal state.
    pub async fn run(mut self) -> LoopExit {
        info!(
            "Subscriber connecting to {} for channel {}",
            self.connector.endpoint(),
            self.channel
        );
        self.enter(SubscriberState::Connecting);

        let dialed = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            dialed = self.connector.connect_subscriber() => Some(dialed),
        };
        let mut subscriber = match dialed {
            None => {
                info!("Shutdown requested before the subscriber connected");
                self.enter(SubscriberState::Stopped);
                return LoopExit::Stopped;
            }
            Some(Ok(subscriber)) => subscriber,
            Some(Err(e)) => return self.fail(e),
        };

        self.enter(SubscriberState::Subscribed);
        let subscribed = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            subscribed = subscriber.subscribe(&self.channel) => Some(subscribed),
        };
        match subscribed {
            None => {
                info!("Shutdown requested while subscribing to {}", self.channel);
                drop(subscriber);
                self.enter(SubscriberState::Stopped);
                return LoopExit::Stopped;
            }
            Some(Ok(())) => {}
            Some(Err(e)) => return self.fail(e),
        }
        self.enter(SubscriberState::Receiving);
        info!("Subscribed to channel {}", self.channel);

        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = tokio::time::timeout(self.receive_timeout, subscriber.next_message()) => received,
            };

            match received {
                Err(_) => trace!("Receive timed out, still listening"),
                Ok(Ok(Some(message))) => {
                    if self.identity.is_self_authored(&message) {
                        trace!("Suppressed own message");
                        continue;
                    }
                    if let Err(e) = self.sink.deliver(&message) {
                        return self.fail(e);
                    }
                }
                Ok(Ok(None)) => {
                    return self.fail(
                        ConnectionError::Closed("subscription stream ended".to_string()).into(),
                    );
                }
                Ok(Err(e)) => return self.fail(e),
            }
        }

        debug!("Unsubscribing from {}", self.channel);
        match tokio::time::timeout(self.receive_timeout, subscriber.unsubscribe(&self.channel))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to unsubscribe from {}: {}", self.channel, e),
            Err(_) => warn!("Timed out unsubscribing from {}", self.channel),
        }
        drop(subscriber);

        self.enter(SubscriberState::Stopped);
        info!("Subscriber for channel {} stopped", self.channel);
        LoopExit::Stopped
    }

    fn enter(&self, state: SubscriberState) {
        trace!("Subscriber state -> {:?}", state);
        self.state.send_replace(state);
    }

    fn fail(&self, err: ServiceError) -> LoopExit {
        error!("Subscriber for channel {} failed: {}", self.channel, err);
        self.enter(SubscriberState::Failed);
        LoopExit::Failed(err)
    }
}

// == Subscriber Handle ==
/// A running subscriber loop.
pub struct SubscriberHandle {
    state: watch::Receiver<SubscriberState>,
    join: JoinHandle<LoopExit>,
}

impl SubscriberHandle {
    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Waits until the loop is receiving or has ended, returning that state.
    pub async fn ready(&mut self) -> SubscriberState {
        let reached = self
            .state
            .wait_for(|state| *state == SubscriberState::Receiving || state.is_terminal())
            .await
            .map(|state| *state);
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<LoopExit, JoinError> {
        self.join.await
    }
}
