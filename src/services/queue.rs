//! Queue Service
//!
//! FIFO queue on a named store list: push appends to the tail, pop removes
//! the head. No queue state lives here; the store's atomic list commands
//! make sure each value is popped by exactly one caller.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{BatchFailure, BatchReport};
use crate::error::Result;
use crate::store::{Connection, Connector, Pool};

// == Queue Service ==
pub struct QueueService<C: Connector> {
    pool: Pool<C>,
    name: Arc<str>,
}

impl<C: Connector> Clone for QueueService<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

impl<C: Connector> QueueService<C> {
    pub fn new(pool: Pool<C>, name: impl Into<Arc<str>>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Name of the backing list.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    // == Push ==
    /// Appends a value to the tail of the queue.
    pub async fn push(&self, value: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.rpush(&self.name, value).await;
        conn.observe(result).map(|len| {
            debug!("Pushed {} to {} (length {})", value, self.name, len);
        })
    }

    // == Push All ==
    /// Pushes values one by one in input order, stopping at the first failure.
    pub async fn push_all(&self, values: Vec<String>) -> BatchReport<String> {
        let mut report = BatchReport::new();
        for value in values {
            match self.push(&value).await {
                Ok(()) => report.applied.push(value),
                Err(error) => {
                    warn!("Failed to push {} to {}: {}", value, self.name, error);
                    report.failure = Some(BatchFailure { item: value, error });
                    break;
                }
            }
        }
        report
    }

    // == Pop ==
    /// Removes and returns the head of the queue. `Ok(None)` means empty.
    pub async fn pop(&self) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.lpop(&self.name).await;
        conn.observe(result)
    }
}
