use reqwest::{Response, StatusCode};
use shared::error::ApiError;
use thiserror::Error;

/// A non-2xx answer from the record API or the object store.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiStatusError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiStatusError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Passes 2xx responses through; anything else becomes an [`ApiStatusError`]
/// carrying the API's `error` field, or the raw body when it is not JSON.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ApiStatusError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiStatusError {
        status,
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        if !api_error.error.is_empty() {
            return api_error.error;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}
