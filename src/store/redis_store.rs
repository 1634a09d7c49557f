//! Redis Store Backend
//!
//! Production backend over the `redis` crate. Command connections are
//! multiplexed async connections used one caller at a time through the pool;
//! subscriptions get their own pub/sub connection.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::{MultiplexedConnection, PubSubSink};
use redis::{Client, Msg, RedisError};

use super::{Connection, Connector, Subscriber};
use crate::error::{ConnectionError, Result, ServiceError};

impl From<RedisError> for ServiceError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            ConnectionError::Closed(err.to_string()).into()
        } else {
            ServiceError::StoreCommand(err.to_string())
        }
    }
}

/// Accepts `host:port` as well as full `redis://` URLs.
pub fn normalize_address(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

// == Redis Connector ==
/// Dials connections to one Redis endpoint.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: Client,
    address: String,
}

impl RedisConnector {
    /// Validates the address and prepares a client. No connection is made yet.
    pub fn new(address: &str) -> Result<Self> {
        let address = normalize_address(address);
        let client = Client::open(address.as_str()).map_err(|e| ConnectionError::Dial {
            endpoint: address.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { client, address })
    }

    fn dial_error(&self, err: RedisError) -> ServiceError {
        ConnectionError::Dial {
            endpoint: self.address.clone(),
            reason: err.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;
    type Subscriber = RedisSubscriber;

    async fn connect(&self) -> Result<RedisConnection> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| self.dial_error(e))?;
        Ok(RedisConnection { conn })
    }

    async fn connect_subscriber(&self) -> Result<RedisSubscriber> {
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| self.dial_error(e))?;
        let (sink, stream) = pubsub.split();
        Ok(RedisSubscriber {
            sink,
            messages: stream.boxed(),
        })
    }

    fn endpoint(&self) -> String {
        self.address.clone()
    }
}

// == Redis Connection ==
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl Connection for RedisConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn)
            .await?;
        Ok(value)
    }

    async fn set_ex(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn rpush(&mut self, list: &str, value: &str) -> Result<usize> {
        let len: usize = redis::cmd("RPUSH")
            .arg(list)
            .arg(value)
            .query_async(&mut self.conn)
            .await?;
        Ok(len)
    }

    async fn lpop(&mut self, list: &str) -> Result<Option<String>> {
        let head: Option<String> = redis::cmd("LPOP")
            .arg(list)
            .query_async(&mut self.conn)
            .await?;
        Ok(head)
    }

    async fn publish(&mut self, channel: &str, message: &str) -> Result<usize> {
        let receivers: usize = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async(&mut self.conn)
            .await?;
        Ok(receivers)
    }
}

// == Redis Subscriber ==
pub struct RedisSubscriber {
    sink: PubSubSink,
    messages: BoxStream<'static, Msg>,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<()> {
        self.sink.subscribe(channel).await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<String>> {
        match self.messages.next().await {
            Some(msg) => Ok(Some(msg.get_payload::<String>()?)),
            None => Ok(None),
        }
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<()> {
        self.sink.unsubscribe(channel).await?;
        Ok(())
    }
}
