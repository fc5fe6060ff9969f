//! Producer side of a chat response stream.
//!
//! The orchestration task owns an [`EventSink`]; the HTTP handler drains the
//! paired receiver into the response body. The sink enforces the stream
//! shape: `start` first and once, exactly one terminal event, and text
//! segments opened by `text-start` and closed by `text-end` before every
//! tool event and before the terminal event.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::{denial_events, new_message_id, new_segment_id, FinishReason, StreamEvent};
use crate::inference::ToolCall;

/// Create a sink and the receiver the response body reads from.
pub fn channel(capacity: usize, cancel: CancellationToken) -> (EventSink, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink::new(tx, cancel), rx)
}

pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    message_id: String,
    started: bool,
    terminated: bool,
    closed: bool,
    text_segment: Option<String>,
    reasoning_segment: Option<String>,
    answer: String,
}

impl EventSink {
    fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            message_id: new_message_id(),
            started: false,
            terminated: false,
            closed: false,
            text_segment: None,
            reasoning_segment: None,
            answer: String::new(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// All text deltas emitted so far, concatenated.
    pub fn answer_text(&self) -> &str {
        &self.answer
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The receiver went away (client disconnected).
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn start(&mut self) -> bool {
        if self.started {
            return !self.closed && !self.terminated;
        }
        let event = StreamEvent::Start {
            message_id: self.message_id.clone(),
        };
        self.emit(event).await
    }

    pub async fn text_delta(&mut self, delta: &str) -> bool {
        if delta.is_empty() {
            return true;
        }
        let id = match &self.text_segment {
            Some(id) => id.clone(),
            None => {
                let id = new_segment_id();
                if !self.emit(StreamEvent::TextStart { id: id.clone() }).await {
                    return false;
                }
                self.text_segment = Some(id.clone());
                id
            }
        };
        let sent = self
            .emit(StreamEvent::TextDelta {
                id,
                delta: delta.to_string(),
            })
            .await;
        if sent {
            self.answer.push_str(delta);
        }
        sent
    }

    pub async fn reasoning_delta(&mut self, delta: &str) -> bool {
        if delta.is_empty() {
            return true;
        }
        let id = match &self.reasoning_segment {
            Some(id) => id.clone(),
            None => {
                let id = new_segment_id();
                if !self.emit(StreamEvent::ReasoningStart { id: id.clone() }).await {
                    return false;
                }
                self.reasoning_segment = Some(id.clone());
                id
            }
        };
        self.emit(StreamEvent::ReasoningDelta {
            id,
            delta: delta.to_string(),
        })
        .await
    }

    pub async fn tool_call(&mut self, call: &ToolCall) -> bool {
        self.emit(StreamEvent::ToolCall {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            args: call.arguments.clone(),
        })
        .await
    }

    pub async fn tool_result(
        &mut self,
        call: &ToolCall,
        result: serde_json::Value,
        is_error: bool,
        duration_ms: u64,
    ) -> bool {
        self.emit(StreamEvent::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            is_error,
            duration_ms,
        })
        .await
    }

    pub async fn finish(&mut self, reason: FinishReason) -> bool {
        self.emit(StreamEvent::Finish {
            finish_reason: reason,
        })
        .await
    }

    pub async fn error(&mut self, text: impl Into<String>) -> bool {
        self.emit(StreamEvent::Error {
            error_text: text.into(),
        })
        .await
    }

    /// Replace the whole response with a moderation denial.
    pub async fn emit_denial(&mut self, text: &str) -> bool {
        let mut sent = true;
        for event in denial_events(&self.message_id, text) {
            if let StreamEvent::TextDelta { delta, .. } = &event {
                self.answer.push_str(delta);
            }
            sent = self.emit(event).await && sent;
        }
        sent
    }

    async fn emit(&mut self, event: StreamEvent) -> bool {
        if self.terminated || self.closed {
            return false;
        }

        let is_start = matches!(event, StreamEvent::Start { .. });
        if self.started && is_start {
            return true;
        }
        if !self.started {
            self.started = true;
            if !is_start {
                let start = StreamEvent::Start {
                    message_id: self.message_id.clone(),
                };
                if !self.send(start).await {
                    return false;
                }
            }
        }

        if (event.is_tool_event() || event.is_terminal()) && !self.close_segments().await {
            return false;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        self.send(event).await
    }

    async fn close_segments(&mut self) -> bool {
        if let Some(id) = self.reasoning_segment.take() {
            if !self.send(StreamEvent::ReasoningEnd { id }).await {
                return false;
            }
        }
        if let Some(id) = self.text_segment.take() {
            if !self.send(StreamEvent::TextEnd { id }).await {
                return false;
            }
        }
        true
    }

    async fn send(&mut self, event: StreamEvent) -> bool {
        if self.tx.send(event).await.is_err() {
            tracing::debug!(message_id = %self.message_id, "stream receiver dropped");
            self.closed = true;
            self.cancel.cancel();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "vectorDatabaseSearch".to_string(),
            arguments: json!({"query": "battery"}),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn text_ids(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_emitted_once_and_implicitly() {
        let (mut sink, rx) = channel(16, CancellationToken::new());
        sink.text_delta("Hello").await;
        sink.start().await;
        sink.finish(FinishReason::Stop).await;
        drop(sink);

        let events = drain(rx).await;
        let starts = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Start { .. }))
            .count();
        assert_eq!(starts, 1);
        assert!(matches!(events[0], StreamEvent::Start { .. }));
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn test_single_terminal_event() {
        let (mut sink, rx) = channel(16, CancellationToken::new());
        sink.start().await;
        assert!(sink.finish(FinishReason::Stop).await);
        assert!(!sink.error("late").await);
        assert!(!sink.text_delta("after").await);
        assert!(sink.is_terminated());
        drop(sink);

        let events = drain(rx).await;
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_segment_id_changes_after_tool_event() {
        let (mut sink, rx) = channel(32, CancellationToken::new());
        sink.text_delta("Let me ").await;
        sink.text_delta("check.").await;
        let c = call("call_1");
        sink.tool_call(&c).await;
        sink.tool_result(&c, json!({"status": "ok"}), false, 5).await;
        sink.text_delta("Found it.").await;
        sink.finish(FinishReason::Stop).await;
        assert_eq!(sink.answer_text(), "Let me check.Found it.");
        drop(sink);

        let events = drain(rx).await;
        let ids = text_ids(&events);
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);

        // The first segment is closed before the tool call.
        let call_at = events.iter().position(StreamEvent::is_tool_event).unwrap();
        assert_eq!(events[call_at - 1], StreamEvent::TextEnd { id: ids[0].clone() });
        assert_eq!(events[call_at + 2], StreamEvent::TextStart { id: ids[2].clone() });
    }

    #[tokio::test]
    async fn test_segments_are_framed() {
        let (mut sink, rx) = channel(32, CancellationToken::new());
        sink.reasoning_delta("Check reviews first.").await;
        sink.text_delta("Hi").await;
        sink.finish(FinishReason::Stop).await;
        drop(sink);

        let types: Vec<String> = drain(rx)
            .await
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            types,
            [
                "start",
                "reasoning-start",
                "reasoning-delta",
                "text-start",
                "text-delta",
                "reasoning-end",
                "text-end",
                "finish"
            ]
        );
    }

    #[tokio::test]
    async fn test_open_segment_closed_before_error() {
        let (mut sink, rx) = channel(16, CancellationToken::new());
        sink.text_delta("Partial").await;
        sink.error("request timed out").await;
        drop(sink);

        let events = drain(rx).await;
        assert_eq!(events.len(), 5);
        assert!(matches!(events[3], StreamEvent::TextEnd { .. }));
        assert!(matches!(events[4], StreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let cancel = CancellationToken::new();
        let (mut sink, rx) = channel(4, cancel.clone());
        drop(rx);
        assert!(!sink.text_delta("anyone there?").await);
        assert!(sink.is_closed());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_emit_denial() {
        let (mut sink, rx) = channel(8, CancellationToken::new());
        assert!(sink.emit_denial("Not something I can help with.").await);
        assert!(sink.is_terminated());
        drop(sink);

        let events = drain(rx).await;
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[4],
            StreamEvent::Finish {
                finish_reason: FinishReason::Moderated
            }
        );
    }
}
