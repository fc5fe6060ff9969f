use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("moderation request timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    #[error("moderation endpoint returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("malformed moderation response: {reason}")]
    InvalidResponse { reason: String },
}
