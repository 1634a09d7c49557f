//! Request and Response models for the HTTP API

pub mod requests;
pub mod responses;

pub use requests::{decode_body, PushRequest, SetRequest};
pub use responses::{HealthResponse, TextLines};
