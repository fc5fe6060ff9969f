use thiserror::Error;

/// Errors from a tool adapter.
///
/// None of these abort a chat request: the orchestrator turns them into a
/// failed tool result and lets the model carry on.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {reason}")]
    RequestFailed {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} returned an unreadable response: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{var} is not configured on the server.")]
    MissingCredential { var: &'static str },
}

impl ToolError {
    pub(crate) fn request(provider: &'static str, err: reqwest::Error) -> Self {
        Self::RequestFailed {
            provider,
            reason: err.to_string(),
        }
    }

    pub(crate) fn decode(provider: &'static str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider,
            reason: err.to_string(),
        }
    }

    /// Read a non-2xx response into [`ToolError::Upstream`].
    pub(crate) async fn upstream(provider: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Self::Upstream {
            provider,
            status,
            body,
        }
    }
}
