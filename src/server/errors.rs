use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::tools::ToolError;

/// Errors returned as a JSON `{error, details?}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error}")]
    Validation {
        error: String,
        details: Option<String>,
    },

    #[error("{error}")]
    Misconfigured { error: String },

    #[error("{error}: {details}")]
    Upstream { error: String, details: String },

    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn validation(error: impl Into<String>) -> Self {
        Self::Validation {
            error: error.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Misconfigured { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Map a web-search failure for the competitors endpoint.
    pub fn from_search(err: ToolError) -> Self {
        match err {
            ToolError::MissingCredential { .. } => Self::Misconfigured {
                error: err.to_string(),
            },
            ToolError::Upstream { body, .. } => Self::Upstream {
                error: "Exa search failed".to_string(),
                details: body,
            },
            other => Self::Internal {
                error: "Failed to search competitors".to_string(),
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = match self {
            Self::Validation {
                error,
                details: Some(details),
            }
            | Self::Upstream { error, details }
            | Self::Internal { error, details } => json!({ "error": error, "details": details }),
            Self::Validation {
                error,
                details: None,
            }
            | Self::Misconfigured { error } => json!({ "error": error }),
        };
        (status, Json(body)).into_response()
    }
}
