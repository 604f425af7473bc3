//! Client error type.
//!
//! Every fallible client operation returns [`ClientError`]. Background refresh
//! loops log and swallow these; user-initiated actions hand them back to the
//! caller.

use reqwest::Response;
use serde_json::Value;
use thiserror::Error;

use crate::session::StorageError;
use crate::validation::ValidationErrors;

/// Errors that can occur when talking to the trading backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status} - {detail}")]
    Api { status: u16, detail: String },

    /// Backend rejected the bearer token; the local session has been cleared.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Operation needs a logged-in user and there is none.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON encoding or decoding failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Durable session storage failed.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value could not be built (e.g. a token with control characters).
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Form input failed client-side validation; no request was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Build a [`ClientError::Api`] from a non-success response.
///
/// The backend reports failures as `{"detail": ...}` where `detail` is either
/// a message string or a list of `{"msg": ...}` validation entries. Falls back
/// to `fallback` when the body carries nothing usable.
pub(crate) async fn error_from_response(response: Response, fallback: &str) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    ClientError::Api {
        status,
        detail: extract_detail(&body).unwrap_or_else(|| fallback.to_string()),
    }
}

/// Pull a human-readable message out of an error body.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail": [{"msg": "field required"}, {"msg": "value is not a valid email"}]}"#;
        assert_eq!(
            extract_detail(body),
            Some("field required; value is not a valid email".to_string())
        );
    }

    #[test]
    fn test_extract_detail_missing() {
        assert_eq!(extract_detail("<html>502</html>"), None);
        assert_eq!(extract_detail(r#"{"error": "x"}"#), None);
        assert_eq!(extract_detail(r#"{"detail": ""}"#), None);
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Api {
            status: 400,
            detail: "Insufficient balance".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 400 - Insufficient balance");
        assert_eq!(
            ClientError::SessionExpired.to_string(),
            "Session expired, please log in again"
        );
    }
}
