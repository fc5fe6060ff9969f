//! Client-side conversation state.
//!
//! Holds the message list seeded with the welcome message, the request
//! status, and how long each tool call took as seen by the client. Stream
//! events from the server are folded in with [`ConversationStore::apply`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use super::types::{Message, MessagePart, MessageRole};
use crate::streaming::StreamEvent;

pub const WELCOME_MESSAGE: &str = "Hi, I'm SellerSight 👋\n\
Your Amazon review intelligence assistant for Amazon sellers, brand managers, and D2C founders.\n\n\
I help you:\n\
• Spot top customer complaints & delights\n\
• Identify feature gaps and improvement opportunities\n\
• Compare products using review insights\n\
• Get clear, actionable recommendations\n\n\
To begin, share:\n\
• ASIN (or competitor ASINs)\n\
• Your goal (launch, optimise, compare)\n\n\
Example: \"Summarise key complaints for ASIN B09XYZ1234 on Amazon IN\"";

/// Label of the action that resets the conversation.
pub const CLEAR_CHAT_TEXT: &str = "New analysis";

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Ready,
    /// Request sent, nothing received yet.
    Submitted,
    Streaming,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Message must be at most {max} characters.")]
    TooLong { max: usize },

    #[error("A response is still streaming")]
    Busy,
}

#[derive(Debug)]
pub struct ConversationStore {
    messages: Vec<Message>,
    status: ClientStatus,
    last_error: Option<String>,
    /// Segment id of the part currently receiving deltas.
    open_segment: Option<String>,
    tool_started: HashMap<String, Instant>,
    durations: HashMap<String, Duration>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: vec![welcome_message()],
            status: ClientStatus::Ready,
            last_error: None,
            open_segment: None,
            tool_started: HashMap::new(),
            durations: HashMap::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Client-observed duration of a finished tool call.
    pub fn tool_duration(&self, tool_call_id: &str) -> Option<Duration> {
        self.durations.get(tool_call_id).copied()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, ClientStatus::Submitted | ClientStatus::Streaming)
    }

    /// Append a user message and return the conversation to send.
    pub fn submit(&mut self, text: &str) -> Result<Vec<Message>, StoreError> {
        if self.is_busy() {
            return Err(StoreError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(StoreError::TooLong {
                max: MAX_MESSAGE_CHARS,
            });
        }

        self.messages.push(Message::user(text));
        self.status = ClientStatus::Submitted;
        self.last_error = None;
        self.open_segment = None;
        Ok(self.messages.clone())
    }

    /// Fold one server event into the conversation.
    ///
    /// Returns `false` when the event was ignored because no request is in
    /// flight (for example after [`stop`](Self::stop)).
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        if !self.is_busy() {
            tracing::debug!(?event, "ignoring stream event, no request in flight");
            return false;
        }

        match event {
            StreamEvent::Start { message_id } => {
                self.begin_assistant(Some(message_id));
            }
            StreamEvent::TextDelta { id, delta } => {
                self.append_delta(id, &delta, false);
            }
            StreamEvent::ReasoningDelta { id, delta } => {
                self.append_delta(id, &delta, true);
            }
            StreamEvent::TextStart { .. } | StreamEvent::ReasoningStart { .. } => {
                self.assistant_parts();
            }
            StreamEvent::TextEnd { id } | StreamEvent::ReasoningEnd { id } => {
                if self.open_segment.as_deref() == Some(id.as_str()) {
                    self.open_segment = None;
                }
            }
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.tool_started.insert(tool_call_id.clone(), Instant::now());
                self.open_segment = None;
                self.assistant_parts().push(MessagePart::ToolInvocation {
                    tool_call_id,
                    tool_name,
                    args,
                    state: Some("call".to_string()),
                    result: None,
                });
            }
            StreamEvent::ToolResult {
                tool_call_id,
                result: value,
                ..
            } => {
                if let Some(started) = self.tool_started.remove(&tool_call_id) {
                    self.durations
                        .insert(tool_call_id.clone(), started.elapsed());
                }
                self.open_segment = None;
                let invocation = self.assistant_parts().iter_mut().find(|p| {
                    matches!(p, MessagePart::ToolInvocation { tool_call_id: id, .. } if *id == tool_call_id)
                });
                if let Some(MessagePart::ToolInvocation { state, result, .. }) = invocation {
                    *state = Some("result".to_string());
                    *result = Some(value);
                }
            }
            StreamEvent::Finish { .. } => {
                self.settle(ClientStatus::Ready);
            }
            StreamEvent::Error { error_text } => {
                self.last_error = Some(error_text);
                self.settle(ClientStatus::Error);
            }
        }
        true
    }

    /// Mark the in-flight request failed without a server `error` event.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_busy() {
            self.last_error = Some(reason.into());
            self.settle(ClientStatus::Error);
        }
    }

    /// Stop listening to the current response. Events that still arrive
    /// are ignored.
    pub fn stop(&mut self) {
        if self.is_busy() {
            self.settle(ClientStatus::Ready);
        }
    }

    /// Start a new analysis: only the welcome message remains.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn settle(&mut self, status: ClientStatus) {
        self.status = status;
        self.open_segment = None;
        self.tool_started.clear();
    }

    fn begin_assistant(&mut self, id: Option<String>) {
        self.status = ClientStatus::Streaming;
        self.open_segment = None;
        self.messages.push(Message {
            id,
            role: MessageRole::Assistant,
            parts: Vec::new(),
        });
    }

    /// Parts of the assistant message being streamed, created on demand.
    fn assistant_parts(&mut self) -> &mut Vec<MessagePart> {
        let streaming = self.status == ClientStatus::Streaming
            && self
                .messages
                .last()
                .is_some_and(|m| m.role == MessageRole::Assistant);
        if !streaming {
            self.begin_assistant(None);
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last].parts
    }

    fn append_delta(&mut self, segment: String, delta: &str, reasoning: bool) {
        let same_segment = self.open_segment.as_deref() == Some(segment.as_str());
        let parts = self.assistant_parts();

        if same_segment {
            match parts.last_mut() {
                Some(MessagePart::Text { text }) if !reasoning => {
                    text.push_str(delta);
                    return;
                }
                Some(MessagePart::Reasoning { text }) if reasoning => {
                    text.push_str(delta);
                    return;
                }
                _ => {}
            }
        }

        let text = delta.to_string();
        parts.push(if reasoning {
            MessagePart::Reasoning { text }
        } else {
            MessagePart::Text { text }
        });
        self.open_segment = Some(segment);
    }
}

fn welcome_message() -> Message {
    Message {
        id: Some(format!("welcome-{}", Uuid::new_v4().simple())),
        role: MessageRole::Assistant,
        parts: vec![MessagePart::Text {
            text: WELCOME_MESSAGE.to_string(),
        }],
    }
}
