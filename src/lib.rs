//! Store Services - cache, queue and messaging over a shared Redis store
//!
//! Three access patterns over one external store: a TTL'd cache, a FIFO work
//! queue, and publish/subscribe messaging. All command traffic goes through a
//! bounded connection pool; pub/sub uses dedicated connections and stops on a
//! shared shutdown signal.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod server;
pub mod services;
pub mod shutdown;
pub mod store;

pub use config::{CacheServerConfig, ConfigError, MessengerConfig, QueueServerConfig};
pub use error::{ConnectionError, Result, ServiceError};
pub use services::{CacheService, QueueService};
pub use shutdown::ShutdownCoordinator;
pub use store::{Pool, PoolOptions};
