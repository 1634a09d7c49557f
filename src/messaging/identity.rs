//! Local user identity: tags outgoing messages and recognises our own echo.

use crate::error::{Result, ServiceError};

/// The local user identifier and the prefix it tags messages with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: String,
    prefix: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "user identifier cannot be empty".to_string(),
            ));
        }
        let prefix = format!("{}: ", id);
        Ok(Self { id, prefix })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `"<id>: <line>"`
    pub fn tag(&self, line: &str) -> String {
        format!("{}{}", self.prefix, line)
    }

    /// True when the message starts with our own tag.
    pub fn is_self_authored(&self, message: &str) -> bool {
        message.as_bytes().starts_with(self.prefix.as_bytes())
    }
}
