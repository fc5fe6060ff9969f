//! Events of the UI message stream.
//!
//! Serialized as JSON objects tagged by `type` with camelCase fields, which
//! is what the browser client consumes. Text and reasoning deltas arrive
//! inside segments framed by `text-start`/`text-end` (`reasoning-start`/
//! `reasoning-end`) carrying the same `id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a stream finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// The model produced a final answer.
    Stop,
    /// The moderation gate blocked the request.
    Moderated,
    /// The step budget ran out; the answer may be partial.
    BudgetExhausted,
    /// Nothing to answer (no messages, or the model stayed silent).
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },

    TextStart { id: String },

    TextDelta { id: String, delta: String },

    TextEnd { id: String },

    ReasoningStart { id: String },

    ReasoningDelta { id: String, delta: String },

    ReasoningEnd { id: String },

    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: serde_json::Value,
        is_error: bool,
        duration_ms: u64,
    },

    #[serde(rename_all = "camelCase")]
    Finish { finish_reason: FinishReason },

    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl StreamEvent {
    /// `finish` and `error` close a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }

    pub fn is_tool_event(&self) -> bool {
        matches!(self, Self::ToolCall { .. } | Self::ToolResult { .. })
    }
}

pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

pub fn new_segment_id() -> String {
    format!("seg_{}", Uuid::new_v4().simple())
}

/// The complete stream sent in place of an answer when moderation blocks a
/// request: `start`, one framed text segment carrying `text`, then
/// `finish(moderated)`.
pub fn denial_events(message_id: &str, text: &str) -> Vec<StreamEvent> {
    let id = new_segment_id();
    vec![
        StreamEvent::Start {
            message_id: message_id.to_string(),
        },
        StreamEvent::TextStart { id: id.clone() },
        StreamEvent::TextDelta {
            id: id.clone(),
            delta: text.to_string(),
        },
        StreamEvent::TextEnd { id },
        StreamEvent::Finish {
            finish_reason: FinishReason::Moderated,
        },
    ]
}
