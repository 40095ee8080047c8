//! Error mapping for provider HTTP responses
//!
//! Converts non-success responses from either provider kind into a
//! [`TransportError::Status`] carrying the most useful message the body offers.

use reqwest::StatusCode;
use serde_json::Value;

use super::{excerpt, TransportError};

/// Map a non-success provider response to a `TransportError`.
///
/// Understands the OpenAI error envelope (`{"error": {"message": ...}}`), the
/// local daemon's flat form (`{"error": "..."}`) and a bare `message` field.
/// Anything else is kept as a raw excerpt of the body.
pub fn map_http_error(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| extract_message(&json))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                excerpt(body.trim())
            }
        });

    TransportError::Status {
        status: status.as_u16(),
        body: message,
    }
}

fn extract_message(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::String(message)) => Some(message.clone()),
        _ => json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_envelope() {
        let err = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
        );
        assert_eq!(
            err,
            TransportError::Status {
                status: 401,
                body: "Incorrect API key provided".to_string()
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_flat_error_and_raw_body() {
        let err = map_http_error(StatusCode::NOT_FOUND, r#"{"error": "model 'llama9' not found"}"#);
        assert!(err.to_string().contains("model 'llama9' not found"));

        let err = map_http_error(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert!(err.to_string().contains("upstream down"));
        assert!(err.is_retryable());

        let err = map_http_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().contains("Service Unavailable"));
    }
}
