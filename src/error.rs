//! Error types for the store services
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// == Connection Error Enum ==
/// Failures to obtain or keep a connection to the store.
///
/// These are recoverable per operation: the caller gets a failed response,
/// the process keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Dialing the store failed
    #[error("failed to connect to {endpoint}: {reason}")]
    Dial { endpoint: String, reason: String },

    /// No pooled connection became available in time
    #[error("connection pool exhausted after waiting {0:?}")]
    PoolExhausted(Duration),

    /// The pool has been drained and accepts no more acquisitions
    #[error("connection pool has been drained")]
    PoolDrained,

    /// An established connection was lost
    #[error("connection closed: {0}")]
    Closed(String),
}

// == Service Error Enum ==
/// Unified error type for the cache, queue and messaging services.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Could not reach the store
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The store rejected a command
    #[error("store command failed: {0}")]
    StoreCommand(String),

    /// Malformed or missing request data
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Local input stream reached its end
    #[error("input exhausted")]
    InputExhausted,

    /// Reading local input failed
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),

    /// The message sink stopped accepting messages
    #[error("message sink closed: {0}")]
    Sink(String),
}

impl ServiceError {
    /// True when the error means the connection itself is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ServiceError::Connection(_))
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::StoreCommand(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::InputExhausted | ServiceError::Input(_) | ServiceError::Sink(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), format!("{}\n", self)).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the store services.
pub type Result<T> = std::result::Result<T, ServiceError>;
