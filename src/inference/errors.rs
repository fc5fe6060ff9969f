//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to the completion service.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the completion endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The completion endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Failed to parse a tool call from the model's response.
    #[error("tool call parse error: {reason}")]
    ToolCallParseError { raw_response: String, reason: String },

    /// Non-2xx HTTP response from the completion endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream parsing or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },
}

impl InferenceError {
    /// Short, user-facing text for a terminal `error` stream event.
    ///
    /// Never includes upstream bodies or endpoints.
    pub fn user_message(&self) -> &'static str {
        match self {
            InferenceError::Timeout { .. } => {
                "The assistant took too long to respond. Please try again."
            }
            InferenceError::HttpError { status: 429, .. } => {
                "The assistant is receiving too many requests right now. Please try again shortly."
            }
            _ => "The assistant is temporarily unavailable. Please try again.",
        }
    }

    /// Whether the failure is likely transient (worth a client resubmit).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::HttpError { status: 429, .. }
                | InferenceError::HttpError { status: 500..=504, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_upstream_body() {
        let err = InferenceError::HttpError {
            status: 500,
            body: "stack trace at line 42".to_string(),
        };
        assert!(!err.user_message().contains("stack trace"));
    }

    #[test]
    fn test_timeout_user_message() {
        let err = InferenceError::Timeout { duration_secs: 120 };
        assert!(err.user_message().contains("too long"));
    }

    #[test]
    fn test_is_transient() {
        assert!(InferenceError::Timeout { duration_secs: 5 }.is_transient());
        assert!(InferenceError::HttpError {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::HttpError {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::StreamError {
            reason: "bad chunk".into()
        }
        .is_transient());
    }
}
