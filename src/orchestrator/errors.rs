use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that abort an orchestration run.
///
/// Tool failures are not here: they are fed back to the model as failed
/// tool results.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("completion engine failed: {0}")]
    Upstream(#[from] InferenceError),
}

impl EngineError {
    /// Short text for the terminal `error` event. Never the upstream body.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Upstream(e) => e.user_message(),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream(e) => e.is_transient(),
        }
    }
}
