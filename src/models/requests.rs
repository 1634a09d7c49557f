//! Request DTOs for the HTTP API
//!
//! Bodies are decoded by hand from raw bytes so that a missing or malformed
//! body is always a 400, whatever the content type header says.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, ServiceError};

/// Decodes a JSON request body, rejecting empty bodies.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServiceError::InvalidRequest(
            "request contained no body".to_string(),
        ));
    }
    serde_json::from_slice(body).map_err(|e| {
        ServiceError::InvalidRequest(format!("error unmarshaling json payload: {}", e))
    })
}

/// Request body for POST /set: a JSON object mapping keys to string values.
///
/// Entries keep the order they have in the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct SetRequest {
    pub entries: Vec<(String, String)>,
}

impl TryFrom<Map<String, Value>> for SetRequest {
    type Error = String;

    fn try_from(object: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let entries = object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(value) => Ok((key, value)),
                other => Err(format!("value for {} must be a string, got {}", key, other)),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

/// Request body for POST /push: a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PushRequest {
    pub values: Vec<String>,
}
