//! Store Module
//!
//! Connection seam over the external key/value store, the bounded connection
//! pool, and the two backends (Redis and in-memory).

mod entry;
pub mod memory;
pub mod pool;
pub mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::{MemoryStore, StoreEvent};
pub use pool::{Pool, PoolOptions, PoolStatus, PooledConnection};
pub use redis_store::RedisConnector;

// == Command Connection ==
/// A connection able to issue ordinary store commands.
///
/// Every method maps to exactly one remote command.
#[async_trait]
pub trait Connection: Send + 'static {
    /// GET: `None` when the key is absent or expired.
    async fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// SET with EX: stores `value` for `ttl_secs` seconds.
    async fn set_ex(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// RPUSH: appends to the tail of a list, returns the new length.
    async fn rpush(&mut self, list: &str, value: &str) -> Result<usize>;

    /// LPOP: removes the head of a list, `None` when the list is empty.
    async fn lpop(&mut self, list: &str) -> Result<Option<String>>;

    /// PUBLISH: returns the number of subscribers that received the message.
    async fn publish(&mut self, channel: &str, message: &str) -> Result<usize>;
}

// == Subscriber Connection ==
/// A dedicated pub/sub connection. Closed by dropping it.
#[async_trait]
pub trait Subscriber: Send + 'static {
    async fn subscribe(&mut self, channel: &str) -> Result<()>;

    /// Waits for the next message payload. `None` means the stream ended.
    ///
    /// Must be cancel-safe: dropping the future loses no message.
    async fn next_message(&mut self) -> Result<Option<String>>;

    async fn unsubscribe(&mut self, channel: &str) -> Result<()>;
}

// == Connector ==
/// Dials new connections to one store endpoint.
#[async_trait]
pub trait Connector: Clone + Send + Sync + 'static {
    type Connection: Connection;
    type Subscriber: Subscriber;

    /// Dials a command connection.
    async fn connect(&self) -> Result<Self::Connection>;

    /// Dials a dedicated connection for pub/sub.
    async fn connect_subscriber(&self) -> Result<Self::Subscriber>;

    /// Human readable description of the endpoint, used in logs.
    fn endpoint(&self) -> String;
}
