//! In-Memory Store Backend
//!
//! An in-process store with the command semantics the services rely on:
//! expiring string values, atomic list push/pop, and channel fan-out.
//! Used by the test suites and for running the services without Redis.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::entry::StoredValue;
use super::{Connection, Connector, Subscriber};
use crate::error::{ConnectionError, Result, ServiceError};

const ENDPOINT: &str = "memory://local";

// == Store Event ==
/// Lifecycle events of pub/sub connections, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Subscribed { subscriber: u64, channel: String },
    Unsubscribed { subscriber: u64, channel: String },
    SubscriberClosed { subscriber: u64 },
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, StoredValue>,
    lists: HashMap<String, VecDeque<String>>,
    channels: HashMap<String, Vec<(u64, mpsc::UnboundedSender<String>)>>,
    events: Vec<StoreEvent>,
    next_subscriber: u64,
    refuse_dials: bool,
    stall_subscribes: bool,
    commands_before_failure: Option<usize>,
}

impl State {
    /// Applies failure injection to one command.
    fn admit_command(&mut self, command: &str) -> Result<()> {
        match self.commands_before_failure.as_mut() {
            Some(0) => Err(ServiceError::StoreCommand(format!(
                "{} rejected by injected failure",
                command
            ))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn admit_dial(&self) -> Result<()> {
        if self.refuse_dials {
            return Err(ConnectionError::Dial {
                endpoint: ENDPOINT.to_string(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// == Memory Store ==
/// Shared handle to an in-memory store. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    open: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of command connections currently open.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of command connections open at the same time.
    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Makes every subsequent dial fail.
    pub fn refuse_dials(&self, refuse: bool) {
        self.state.lock().refuse_dials = refuse;
    }

    /// Makes every subsequent SUBSCRIBE wait forever.
    pub fn stall_subscribes(&self, stall: bool) {
        self.state.lock().stall_subscribes = stall;
    }

    /// Lets `n` more commands succeed, then rejects every command.
    pub fn fail_commands_after(&self, n: usize) {
        self.state.lock().commands_before_failure = Some(n);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.refuse_dials = false;
        state.stall_subscribes = false;
        state.commands_before_failure = None;
    }

    /// Current length of a list.
    pub fn list_len(&self, list: &str) -> usize {
        self.state.lock().lists.get(list).map_or(0, VecDeque::len)
    }

    /// Number of subscribers currently registered on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state.lock().channels.get(channel).map_or(0, Vec::len)
    }

    /// Pub/sub lifecycle events so far.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.state.lock().events.clone()
    }
}

#[async_trait]
impl Connector for MemoryStore {
    type Connection = MemoryConnection;
    type Subscriber = MemorySubscriber;

    async fn connect(&self) -> Result<MemoryConnection> {
        self.state.lock().admit_dial()?;
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_open, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.clone(),
        })
    }

    async fn connect_subscriber(&self) -> Result<MemorySubscriber> {
        let id = {
            let mut state = self.state.lock();
            state.admit_dial()?;
            state.next_subscriber += 1;
            state.next_subscriber
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(MemorySubscriber {
            id,
            store: self.clone(),
            sender,
            receiver,
        })
    }

    fn endpoint(&self) -> String {
        ENDPOINT.to_string()
    }
}

// == Memory Connection ==
/// A command connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.store.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let mut state = self.store.state.lock();
        state.admit_command("GET")?;

        match state.values.get(key) {
            Some(entry) if entry.is_expired() => {
                state.values.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut state = self.store.state.lock();
        state.admit_command("SET")?;

        let entry = match ttl_secs {
            0 => None,
            _ => StoredValue::new(value.to_string(), ttl_secs),
        };
        let entry = entry.ok_or_else(|| {
            ServiceError::StoreCommand("invalid expire time in 'set' command".to_string())
        })?;
        state.values.insert(key.to_string(), entry);
        Ok(())
    }

    async fn rpush(&mut self, list: &str, value: &str) -> Result<usize> {
        let mut state = self.store.state.lock();
        state.admit_command("RPUSH")?;

        let entries = state.lists.entry(list.to_string()).or_default();
        entries.push_back(value.to_string());
        Ok(entries.len())
    }

    async fn lpop(&mut self, list: &str) -> Result<Option<String>> {
        let mut state = self.store.state.lock();
        state.admit_command("LPOP")?;

        let Some(entries) = state.lists.get_mut(list) else {
            return Ok(None);
        };
        let head = entries.pop_front();
        if entries.is_empty() {
            state.lists.remove(list);
        }
        Ok(head)
    }

    async fn publish(&mut self, channel: &str, message: &str) -> Result<usize> {
        let mut state = self.store.state.lock();
        state.admit_command("PUBLISH")?;

        let Some(subscribers) = state.channels.get_mut(channel) else {
            return Ok(0);
        };
        subscribers.retain(|(_, sender)| !sender.is_closed());
        let delivered = subscribers
            .iter()
            .filter(|(_, sender)| sender.send(message.to_string()).is_ok())
            .count();
        Ok(delivered)
    }
}

// == Memory Subscriber ==
/// A dedicated pub/sub connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySubscriber {
    id: u64,
    store: MemoryStore,
    sender: mpsc::UnboundedSender<String>,
    receiver: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<()> {
        let stalled = self.store.state.lock().stall_subscribes;
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.store.state.lock();
        state.admit_command("SUBSCRIBE")?;

        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .push((self.id, self.sender.clone()));
        state.events.push(StoreEvent::Subscribed {
            subscriber: self.id,
            channel: channel.to_string(),
        });
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<String>> {
        Ok(self.receiver.recv().await)
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<()> {
        let mut state = self.store.state.lock();
        state.admit_command("UNSUBSCRIBE")?;

        if let Some(subscribers) = state.channels.get_mut(channel) {
            subscribers.retain(|(id, _)| *id != self.id);
        }
        state.events.push(StoreEvent::Unsubscribed {
            subscriber: self.id,
            channel: channel.to_string(),
        });
        Ok(())
    }
}

impl Drop for MemorySubscriber {
    fn drop(&mut self) {
        let mut state = self.store.state.lock();
        for subscribers in state.channels.values_mut() {
            subscribers.retain(|(id, _)| *id != self.id);
        }
        state
            .events
            .push(StoreEvent::SubscriberClosed { subscriber: self.id });
    }
}
