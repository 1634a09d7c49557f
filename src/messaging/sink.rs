//! Destinations for messages received by the subscriber loop.

use std::io::Write;

use tokio::sync::mpsc;

use crate::error::{Result, ServiceError};

/// Receives forwarded messages.
pub trait MessageSink: Send + 'static {
    fn deliver(&mut self, message: &str) -> Result<()>;
}

/// Prints each message as a line on standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn deliver(&mut self, message: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", message)
            .and_then(|_| stdout.flush())
            .map_err(|e| ServiceError::Sink(e.to_string()))
    }
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn deliver(&mut self, message: &str) -> Result<()> {
        self.send(message.to_string())
            .map_err(|_| ServiceError::Sink("receiver dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (mut sender, mut receiver) = mpsc::unbounded_channel();
        sender.deliver("hello").unwrap();
        assert_eq!(receiver.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_channel_sink_reports_dropped_receiver() {
        let (mut sender, receiver) = mpsc::unbounded_channel::<String>();
        drop(receiver);
        assert!(matches!(sender.deliver("hello"), Err(ServiceError::Sink(_))));
    }
}
