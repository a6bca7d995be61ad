use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the record API for any non-2xx response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} must be a positive integer")]
    NotPositive { field: &'static str },
}
