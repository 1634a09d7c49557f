//! Stored Value Module
//!
//! A string value held by the in-memory backend, with a mandatory expiry.

use std::time::{Duration, Instant};

// == Stored Value ==
/// A value written by SET EX.
#[derive(Debug, Clone)]
pub(crate) struct StoredValue {
    /// The stored value
    pub value: String,
    /// Instant at which the value stops being visible
    pub expires_at: Instant,
}

impl StoredValue {
    // == Constructor ==
    /// Creates a value that expires `ttl_secs` seconds from now.
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn new(value: String, ttl_secs: u64) -> Option<Self> {
        let expires_at = Instant::now().checked_add(Duration::from_secs(ttl_secs))?;
        Some(Self { value, expires_at })
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiry.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}
