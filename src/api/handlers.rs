//! API Handlers
//!
//! HTTP request handlers for the cache and queue endpoints. Each handler gets
//! its service through axum state; there is no global handle.

use axum::{
    body::Bytes,
    extract::{FromRef, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::error::{Result, ServiceError};
use crate::models::{decode_body, HealthResponse, PushRequest, SetRequest, TextLines};
use crate::services::{CacheService, QueueService};
use crate::store::{Connector, Pool};

impl<C: Connector> FromRef<CacheService<C>> for Pool<C> {
    fn from_ref(service: &CacheService<C>) -> Self {
        service.pool().clone()
    }
}

impl<C: Connector> FromRef<QueueService<C>> for Pool<C> {
    fn from_ref(service: &QueueService<C>) -> Self {
        service.pool().clone()
    }
}

/// Handler for GET /get?key=K1&key=K2
///
/// Answers one line per key, in query order: `K = V`, or `K not found`.
pub async fn get_handler<C: Connector>(
    State(cache): State<CacheService<C>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<TextLines> {
    let keys: Vec<String> = params
        .into_iter()
        .filter(|(name, _)| name == "key")
        .map(|(_, key)| key)
        .collect();
    if keys.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "at least one key parameter is required".to_string(),
        ));
    }

    info!("Getting values for {:?}", keys);
    let found = cache.get_many(&keys).await?;

    let lines = found
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{} = {}", key, value),
            None => format!("{} not found", key),
        })
        .collect();
    Ok(TextLines::ok(lines))
}

/// Handler for POST /set
///
/// Body: a JSON object of string values, set in body order with the
/// configured expiry. Answers `K set to V` per key.
pub async fn set_handler<C: Connector>(
    State(cache): State<CacheService<C>>,
    body: Bytes,
) -> Result<TextLines> {
    let req: SetRequest = decode_body(&body)?;
    info!("Received set request for {} keys", req.entries.len());

    let report = cache.set_many(req.entries).await;
    Ok(TextLines::from_batch(
        report,
        |(key, value)| format!("{} set to {}", key, value),
        |(key, _), error| format!("failed to set {}: {}", key, error),
    ))
}

/// Handler for GET /pop
///
/// Answers the popped value, 404 when the queue is empty, 400 when the
/// store command fails.
pub async fn pop_handler<C: Connector>(State(queue): State<QueueService<C>>) -> TextLines {
    info!("Popping first value off queue {}", queue.name());

    match queue.pop().await {
        Ok(Some(value)) => TextLines::ok(vec![value]),
        Ok(None) => TextLines {
            status: StatusCode::NOT_FOUND,
            lines: vec![format!("queue {} is empty", queue.name())],
        },
        Err(e) => {
            warn!("Pop from {} failed: {}", queue.name(), e);
            TextLines {
                status: StatusCode::BAD_REQUEST,
                lines: vec![format!("error issuing pop command: {}", e)],
            }
        }
    }
}

/// Handler for POST /push
///
/// Body: a JSON array of strings, pushed in order. Answers `V pushed` per
/// value; on a partial failure the values already pushed stay pushed.
pub async fn push_handler<C: Connector>(
    State(queue): State<QueueService<C>>,
    body: Bytes,
) -> Result<TextLines> {
    let req: PushRequest = decode_body(&body)?;
    info!("Received push request for {} values", req.values.len());

    let report = queue.push_all(req.values).await;
    Ok(TextLines::from_batch(
        report,
        |value| format!("{} pushed", value),
        |value, error| format!("failed to push {}: {}", value, error),
    ))
}

/// Handler for GET /health
pub async fn health_handler<C: Connector>(State(pool): State<Pool<C>>) -> Json<HealthResponse> {
    Json(HealthResponse::new(pool.status(), pool.is_drained()))
}
