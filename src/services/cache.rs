//! Cache Service
//!
//! Get/set of string values with a mandatory per-key expiry. The store is
//! authoritative: nothing is kept locally.

use tracing::{debug, warn};

use super::{BatchFailure, BatchReport};
use crate::error::{Result, ServiceError};
use crate::store::{Connection, Connector, Pool};

/// Expiry used by `set_default` when none is configured.
pub const DEFAULT_TTL_SECS: u64 = 666;

// == Cache Service ==
pub struct CacheService<C: Connector> {
    pool: Pool<C>,
    default_ttl: u64,
}

impl<C: Connector> Clone for CacheService<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            default_ttl: self.default_ttl,
        }
    }
}

impl<C: Connector> CacheService<C> {
    pub fn new(pool: Pool<C>, default_ttl: u64) -> Self {
        Self { pool, default_ttl }
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Get ==
    /// Looks up a key. `Ok(None)` means the key is missing or expired.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.get(key).await;
        conn.observe(result)
    }

    // == Set ==
    /// Stores a value for `ttl_secs` whole seconds.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        if ttl_secs == 0 {
            return Err(ServiceError::InvalidRequest(
                "ttl must be at least one second".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let result = conn.set_ex(key, value, ttl_secs).await;
        conn.observe(result)
    }

    /// Stores a value with the service's configured expiry.
    pub async fn set_default(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value, self.default_ttl).await
    }

    // == Get Many ==
    /// Looks up keys one by one, in order. Stops at the first store error.
    pub async fn get_many(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(key).await?;
            debug!("Got {:?} for {}", value, key);
            found.push((key.clone(), value));
        }
        Ok(found)
    }

    // == Set Many ==
    /// Sets entries one by one with the default expiry, in order.
    pub async fn set_many(&self, entries: Vec<(String, String)>) -> BatchReport<(String, String)> {
        let mut report = BatchReport::new();
        for (key, value) in entries {
            match self.set_default(&key, &value).await {
                Ok(()) => {
                    debug!("Set {} to {}", key, value);
                    report.applied.push((key, value));
                }
                Err(error) => {
                    warn!("Failed to set {}: {}", key, error);
                    report.failure = Some(BatchFailure {
                        item: (key, value),
                        error,
                    });
                    break;
                }
            }
        }
        report
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PoolOptions};

    fn service(store: &MemoryStore) -> CacheService<MemoryStore> {
        let pool = Pool::new(store.clone(), PoolOptions::default());
        CacheService::new(pool, DEFAULT_TTL_SECS)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = service(&MemoryStore::new());

        cache.set("key1", "value1", 60).await.unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_an_error() {
        let cache = service(&MemoryStore::new());

        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_requires_ttl() {
        let cache = service(&MemoryStore::new());

        let result = cache.set("key1", "value1", 0).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_a_store_error() {
        let cache = service(&MemoryStore::new());

        let result = cache.set("key1", "value1", u64::MAX).await;
        assert!(matches!(result, Err(ServiceError::StoreCommand(_))));
        assert_eq!(cache.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let store = MemoryStore::new();
        let cache = service(&store);
        store.fail_commands_after(0);

        let result = cache.get("key1").await;
        assert!(matches!(result, Err(ServiceError::StoreCommand(_))));
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = service(&MemoryStore::new());

        cache.set("short", "lived", 1).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_many_keeps_order() {
        let cache = service(&MemoryStore::new());
        cache.set_default("b", "2").await.unwrap();
        cache.set_default("a", "1").await.unwrap();

        let keys = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let found = cache.get_many(&keys).await.unwrap();

        assert_eq!(
            found,
            vec![
                ("b".to_string(), Some("2".to_string())),
                ("missing".to_string(), None),
                ("a".to_string(), Some("1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_many_reports_partial_failure() {
        let store = MemoryStore::new();
        let cache = service(&store);
        store.fail_commands_after(1);

        let report = cache
            .set_many(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ])
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.applied, vec![("a".to_string(), "1".to_string())]);
        let failure = report.failure.unwrap();
        assert_eq!(failure.item.0, "b");

        store.clear_failures();
        assert_eq!(cache.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get("c").await.unwrap(), None);
    }
}
