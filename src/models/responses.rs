//! Response DTOs for the HTTP API
//!
//! Command endpoints answer in plain text, one line per item; the health
//! endpoint answers in JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ServiceError;
use crate::services::BatchReport;
use crate::store::PoolStatus;

// == Text Lines ==
/// A plain-text body made of newline-terminated lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLines {
    pub status: StatusCode,
    pub lines: Vec<String>,
}

impl TextLines {
    pub fn ok(lines: Vec<String>) -> Self {
        Self {
            status: StatusCode::OK,
            lines,
        }
    }

    /// Renders a batch: one line per applied item, then the failure if any.
    ///
    /// A failed batch takes the status of its error.
    pub fn from_batch<T>(
        report: BatchReport<T>,
        applied: impl Fn(&T) -> String,
        failed: impl Fn(&T, &ServiceError) -> String,
    ) -> Self {
        let mut lines: Vec<String> = report.applied.iter().map(&applied).collect();
        let status = match &report.failure {
            Some(failure) => {
                lines.push(failed(&failure.item, &failure.error));
                failure.error.status_code()
            }
            None => StatusCode::OK,
        };
        Self { status, lines }
    }

    pub fn body(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }
}

impl IntoResponse for TextLines {
    fn into_response(self) -> Response {
        let body = self.body();
        (self.status, body).into_response()
    }
}

// == Health Response ==
/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "draining" once shutdown began
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub pool: PoolStatus,
}

impl HealthResponse {
    pub fn new(pool: PoolStatus, draining: bool) -> Self {
        let status = if draining { "draining" } else { "healthy" };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            pool,
        }
    }
}
