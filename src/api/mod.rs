//! API Module
//!
//! HTTP handlers and routing for the cache and queue servers.
//!
//! # Endpoints
//! - `GET /get?key=K1&key=K2` - Look up keys (cache)
//! - `POST /set` - Set keys from a JSON object (cache)
//! - `GET /pop` - Pop the queue head (queue)
//! - `POST /push` - Push values from a JSON array (queue)
//! - `GET /health` - Health check (both)

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{cache_router, queue_router};
