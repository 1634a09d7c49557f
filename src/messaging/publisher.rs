//! Publisher
//!
//! Publishes each line of local input, tagged with the local identity, over a
//! dedicated connection. Lines go out in the order they are read.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use super::Identity;
use crate::error::{Result, ServiceError};
use crate::shutdown::ShutdownSignal;
use crate::store::{Connection, Connector};

// == Publisher ==
pub struct Publisher<C: Connection> {
    conn: C,
    channel: String,
    identity: Identity,
}

impl<C: Connection> Publisher<C> {
    pub fn new(conn: C, channel: impl Into<String>, identity: Identity) -> Self {
        Self {
            conn,
            channel: channel.into(),
            identity,
        }
    }

    /// Dials a dedicated connection for publishing.
    pub async fn connect<K>(
        connector: &K,
        channel: impl Into<String>,
        identity: Identity,
    ) -> Result<Self>
    where
        K: Connector<Connection = C>,
    {
        let conn = connector.connect().await?;
        Ok(Self::new(conn, channel, identity))
    }

    /// Tags one line and publishes it. Returns the number of receivers.
    pub async fn publish(&mut self, line: &str) -> Result<usize> {
        let message = self.identity.tag(line);
        let receivers = self.conn.publish(&self.channel, &message).await?;
        debug!("Published to {} ({} receivers)", self.channel, receivers);
        Ok(receivers)
    }

    // == Run ==
    /// Publishes every line read from `input` until shutdown.
    ///
    /// End of input is reported as [`ServiceError::InputExhausted`]; a read
    /// failure or a failed publish is returned as is. Returns `Ok(())` only
    /// when the shutdown signal fires.
    pub async fn run<R>(&mut self, input: R, shutdown: &ShutdownSignal) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Publisher stopping on shutdown");
                    return Ok(());
                }
                next = lines.next_line() => next?,
            };

            match next {
                Some(line) => {
                    self.publish(&line).await?;
                }
                None => return Err(ServiceError::InputExhausted),
            }
        }
    }
}
