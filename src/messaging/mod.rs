//! Messaging Module
//!
//! Publish/subscribe chat over a store channel: a publisher fed from local
//! input and a subscriber loop running next to it until shutdown.

mod identity;
mod publisher;
mod sink;
mod subscriber;

pub use identity::Identity;
pub use publisher::Publisher;
pub use sink::{MessageSink, StdoutSink};
pub use subscriber::{
    LoopExit, SubscriberHandle, SubscriberLoop, SubscriberState, DEFAULT_RECEIVE_TIMEOUT,
};
