//! Queue server: `POST /push` and `GET /pop` on one named Redis list.

use anyhow::Context;
use tracing::info;

use store_services::api::queue_router;
use store_services::logging::{self, LogTarget};
use store_services::store::RedisConnector;
use store_services::{Pool, QueueServerConfig, QueueService, ShutdownCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogTarget::Stdout);
    info!("Starting queue server");

    let config = QueueServerConfig::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: store={}, queue={}, pool_size={}, bind={}",
        config.store.address, config.queue_name, config.store.pool.size, config.bind_addr
    );

    let connector = RedisConnector::new(&config.store.address)?;
    let pool = Pool::connect(connector, config.store.pool)
        .await
        .context("failed to create store connection pool")?;

    let app = queue_router(QueueService::new(pool.clone(), config.queue_name.as_str()));
    store_services::server::serve(
        app,
        config.bind_addr,
        pool,
        ShutdownCoordinator::new(),
        config.shutdown_timeout,
    )
    .await
}
