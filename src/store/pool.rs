//! Connection Pool Module
//!
//! A bounded set of reusable store connections shared by concurrent request
//! handlers. At most `size` connections exist at once: every checkout holds a
//! semaphore permit, and the connection travels back to the idle list when
//! its guard is dropped.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::Connector;
use crate::error::{ConnectionError, Result};

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: usize = 10;

// == Pool Options ==
/// Construction parameters for a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of live connections
    pub size: usize,
    /// How long `acquire` may wait; `None` blocks until a connection frees up
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            acquire_timeout: None,
        }
    }
}

// == Pool Status ==
/// Point-in-time occupancy of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub idle: usize,
    pub in_use: usize,
}

struct Inner<C: Connector> {
    connector: C,
    idle: Mutex<Vec<C::Connection>>,
    permits: Arc<Semaphore>,
    options: PoolOptions,
    drained: AtomicBool,
}

// == Pool ==
/// Bounded connection pool. Cheap to clone; clones share the same connections.
pub struct Pool<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Pool<C> {
    /// Creates an empty pool. Connections are dialed on first use.
    pub fn new(connector: C, options: PoolOptions) -> Self {
        let size = options.size.max(1);
        Self {
            inner: Arc::new(Inner {
                connector,
                idle: Mutex::new(Vec::with_capacity(size)),
                permits: Arc::new(Semaphore::new(size)),
                options: PoolOptions { size, ..options },
                drained: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a pool and dials all of its connections up front.
    ///
    /// Fails if any connection cannot be established, so a misconfigured
    /// store address is caught at startup.
    pub async fn connect(connector: C, options: PoolOptions) -> Result<Self> {
        let pool = Self::new(connector, options);
        let size = pool.inner.options.size;

        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(pool.inner.connector.connect().await?);
        }
        pool.inner.idle.lock().extend(connections);

        info!(
            "Connection pool ready: {} connections to {}",
            size,
            pool.inner.connector.endpoint()
        );
        Ok(pool)
    }

    // == Acquire ==
    /// Checks out a connection, waiting while the pool is saturated.
    ///
    /// With an acquire timeout configured, a wait longer than the timeout
    /// fails with [`ConnectionError::PoolExhausted`].
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let permits = Arc::clone(&self.inner.permits);
        let permit = match self.inner.options.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, permits.acquire_owned())
                .await
                .map_err(|_| ConnectionError::PoolExhausted(limit))?,
            None => permits.acquire_owned().await,
        }
        .map_err(|_| ConnectionError::PoolDrained)?;

        let reused = self.inner.idle.lock().pop();
        let connection = match reused {
            Some(connection) => connection,
            None => {
                debug!("Dialing new pooled connection");
                // The permit drops with this scope if the dial fails.
                self.inner.connector.connect().await?
            }
        };

        Ok(PooledConnection {
            connection: Some(connection),
            pool: Arc::clone(&self.inner),
            discard: false,
            _permit: permit,
        })
    }

    // == Drain ==
    /// Closes idle connections and rejects further acquisitions.
    ///
    /// Connections checked out at this point are closed when released.
    pub fn drain(&self) {
        let closed = {
            // Guards re-check the flag under this lock before returning a
            // connection.
            let mut idle = self.inner.idle.lock();
            if self.inner.drained.swap(true, Ordering::SeqCst) {
                return;
            }
            self.inner.permits.close();
            let count = idle.len();
            idle.clear();
            count
        };
        info!("Connection pool drained, closed {} idle connections", closed);
    }

    pub fn is_drained(&self) -> bool {
        self.inner.drained.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> usize {
        self.inner.options.size
    }

    pub fn status(&self) -> PoolStatus {
        let size = self.inner.options.size;
        let in_use = if self.is_drained() {
            0
        } else {
            size - self.inner.permits.available_permits()
        };
        PoolStatus {
            size,
            idle: self.inner.idle.lock().len(),
            in_use,
        }
    }
}

// == Pooled Connection ==
/// A checked-out connection. Returned to the pool when dropped.
pub struct PooledConnection<C: Connector> {
    connection: Option<C::Connection>,
    pool: Arc<Inner<C>>,
    discard: bool,
    // Released after `drop` has put the connection back.
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    /// Marks the connection as broken so it is closed instead of reused.
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// Passes a command result through, discarding the connection when the
    /// result is a connection-level failure.
    pub fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_connection_error() {
                warn!("Discarding pooled connection after error: {}", err);
                self.discard();
            }
        }
        result
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection present until drop"))
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection present until drop"))
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        if self.discard {
            return;
        }
        let mut idle = self.pool.idle.lock();
        if !self.pool.drained.load(Ordering::SeqCst) {
            idle.push(connection);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::store::{Connection, MemoryStore};

    fn options(size: usize) -> PoolOptions {
        PoolOptions {
            size,
            acquire_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_connect_dials_all_connections() {
        let store = MemoryStore::new();
        let pool = Pool::connect(store.clone(), options(3)).await.unwrap();

        assert_eq!(store.open_connections(), 3);
        assert_eq!(
            pool.status(),
            PoolStatus {
                size: 3,
                idle: 3,
                in_use: 0
            }
        );
    }

    #[tokio::test]
    async fn test_connect_fails_when_store_unreachable() {
        let store = MemoryStore::new();
        store.refuse_dials(true);

        let result = Pool::connect(store, options(2)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Connection(ConnectionError::Dial { .. }))
        ));
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let store = MemoryStore::new();
        let pool = Pool::new(store.clone(), options(4));

        {
            let mut conn = pool.acquire().await.unwrap();
            conn.set_ex("k", "v", 60).await.unwrap();
        }
        {
            let mut conn = pool.acquire().await.unwrap();
            assert_eq!(conn.get("k").await.unwrap(), Some("v".to_string()));
        }

        assert_eq!(store.peak_connections(), 1);
        assert_eq!(pool.status().idle, 1);
    }

    #[tokio::test]
    async fn test_acquire_blocks_until_release() {
        let pool = Pool::new(MemoryStore::new(), options(1));
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "acquire should wait for a free slot");

        drop(held);
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_timeout_reports_exhaustion() {
        let pool = Pool::new(
            MemoryStore::new(),
            PoolOptions {
                size: 1,
                acquire_timeout: Some(Duration::from_millis(20)),
            },
        );
        let _held = pool.acquire().await.unwrap();

        let result = pool.acquire().await;
        assert!(matches!(
            result,
            Err(ServiceError::Connection(ConnectionError::PoolExhausted(_)))
        ));
    }

    #[tokio::test]
    async fn test_failed_dial_releases_slot() {
        let store = MemoryStore::new();
        let pool = Pool::new(store.clone(), options(1));

        store.refuse_dials(true);
        assert!(pool.acquire().await.is_err());

        store.refuse_dials(false);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_discarded_connection_is_closed() {
        let store = MemoryStore::new();
        let pool = Pool::new(store.clone(), options(2));

        let mut conn = pool.acquire().await.unwrap();
        conn.discard();
        drop(conn);

        assert_eq!(store.open_connections(), 0);
        assert_eq!(pool.status().idle, 0);
    }

    #[tokio::test]
    async fn test_observe_discards_on_connection_error() {
        let store = MemoryStore::new();
        let pool = Pool::new(store.clone(), options(2));

        let mut conn = pool.acquire().await.unwrap();
        let result: Result<()> = conn.observe(Err(ConnectionError::Closed("reset".into()).into()));
        assert!(result.is_err());
        drop(conn);
        assert_eq!(pool.status().idle, 0);

        let mut conn = pool.acquire().await.unwrap();
        let result: Result<()> = conn.observe(Err(ServiceError::StoreCommand("WRONGTYPE".into())));
        assert!(result.is_err());
        drop(conn);
        assert_eq!(pool.status().idle, 1);
    }

    #[tokio::test]
    async fn test_drain_rejects_acquire() {
        let store = MemoryStore::new();
        let pool = Pool::connect(store.clone(), options(2)).await.unwrap();

        pool.drain();
        pool.drain();

        assert!(pool.is_drained());
        assert_eq!(store.open_connections(), 0);
        assert!(matches!(
            pool.acquire().await,
            Err(ServiceError::Connection(ConnectionError::PoolDrained))
        ));
    }

    #[tokio::test]
    async fn test_drain_closes_checked_out_connection_on_release() {
        let store = MemoryStore::new();
        let pool = Pool::connect(store.clone(), options(2)).await.unwrap();

        let conn = pool.acquire().await.unwrap();
        pool.drain();
        assert_eq!(store.open_connections(), 1);

        drop(conn);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_drain_during_releases_leaves_nothing_open() {
        for _ in 0..20 {
            let store = MemoryStore::new();
            let pool = Pool::connect(store.clone(), options(4)).await.unwrap();

            let mut workers = Vec::new();
            for _ in 0..4 {
                let pool = pool.clone();
                workers.push(tokio::spawn(async move {
                    while let Ok(conn) = pool.acquire().await {
                        drop(conn);
                        tokio::task::yield_now().await;
                    }
                }));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            pool.drain();
            for worker in workers {
                worker.await.unwrap();
            }

            assert_eq!(pool.status().idle, 0);
            assert_eq!(store.open_connections(), 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_load_respects_bound() {
        let store = MemoryStore::new();
        let pool = Pool::new(store.clone(), options(3));

        let mut handles = Vec::new();
        for i in 0..20 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                conn.rpush("load", &i.to_string()).await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(store.peak_connections() <= 3);
        assert_eq!(store.list_len("load"), 20);
    }
}
