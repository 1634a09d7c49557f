//! Services Module
//!
//! The cache and queue services. Each operation draws one connection from the
//! pool, issues one store command and returns the connection.

mod cache;
mod queue;


pub use cache::{CacheService, DEFAULT_TTL_SECS};
pub use queue::QueueService;

use crate::error::ServiceError;

// == Batch Report ==
/// Outcome of a sequence of independent commands.
///
/// Commands run in input order and stop at the first failure. Items applied
/// before the failure stay applied.
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Items whose command succeeded, in input order
    pub applied: Vec<T>,
    /// The item that failed and why
    pub failure: Option<BatchFailure<T>>,
}

#[derive(Debug)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: ServiceError,
}

impl<T> BatchReport<T> {
    pub(crate) fn new() -> Self {
        Self {
            applied: Vec::new(),
            failure: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}
