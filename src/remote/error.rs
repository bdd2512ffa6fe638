//! Normalized remote failure.
//!
//! Every rejection coming back across the data-access boundary is turned into a
//! [`RemoteError`] before it reaches a continuation or the announce sink.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a remote data-access call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
            error_code: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Resource lookup miss (file path, workspace name, ...)
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::new(format!("{} not found", what.as_ref())).with_code("not_found")
    }

    /// The remote side released the reply without answering.
    pub fn dropped() -> Self {
        Self::new("Request was dropped before it settled")
            .with_description("The data source released the request without a result")
            .with_code("dropped")
    }

    /// Wrap any displayable failure (I/O, parse) as a remote error.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string()).with_code("internal")
    }
}
