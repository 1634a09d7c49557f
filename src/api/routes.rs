//! API Routes
//!
//! Configures the Axum routers for the cache and queue servers.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{get_handler, health_handler, pop_handler, push_handler, set_handler};
use crate::services::{CacheService, QueueService};
use crate::store::Connector;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Creates the cache server router.
///
/// # Endpoints
/// - `GET /get?key=K` - Look up one or more keys
/// - `POST /set` - Set keys from a JSON object
/// - `GET /health` - Health check with pool occupancy
pub fn cache_router<C: Connector>(service: CacheService<C>) -> Router {
    Router::new()
        .route("/get", get(get_handler::<C>))
        .route("/set", post(set_handler::<C>))
        .route("/health", get(health_handler::<C>))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Creates the queue server router.
///
/// # Endpoints
/// - `GET /pop` - Pop the head of the queue
/// - `POST /push` - Push values from a JSON array
/// - `GET /health` - Health check with pool occupancy
pub fn queue_router<C: Connector>(service: QueueService<C>) -> Router {
    Router::new()
        .route("/pop", get(pop_handler::<C>))
        .route("/push", post(push_handler::<C>))
        .route("/health", get(health_handler::<C>))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
