//! Cache server: `GET /get` and `POST /set` over a pooled Redis connection set.

use anyhow::Context;
use tracing::info;

use store_services::api::cache_router;
use store_services::logging::{self, LogTarget};
use store_services::store::RedisConnector;
use store_services::{CacheServerConfig, CacheService, Pool, ShutdownCoordinator};

/// # Startup Sequence
/// 1. Initialize logging
/// 2. Load configuration, exiting on any missing variable
/// 3. Dial the connection pool, exiting if the store is unreachable
/// 4. Serve until Ctrl+C/SIGTERM, then drain the pool
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogTarget::Stdout);
    info!("Starting cache server");

    let config = CacheServerConfig::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: store={}, pool_size={}, default_ttl={}s, bind={}",
        config.store.address, config.store.pool.size, config.default_ttl, config.bind_addr
    );

    let connector = RedisConnector::new(&config.store.address)?;
    let pool = Pool::connect(connector, config.store.pool)
        .await
        .context("failed to create store connection pool")?;

    let app = cache_router(CacheService::new(pool.clone(), config.default_ttl));
    store_services::server::serve(
        app,
        config.bind_addr,
        pool,
        ShutdownCoordinator::new(),
        config.shutdown_timeout,
    )
    .await
}
