//! Server-Sent Events framing.
//!
//! `SseDecoder` splits a raw byte stream into `data:` payloads and is shared
//! by the completion-stream parser and the chat client. `to_sse_event`
//! encodes a [`StreamEvent`] for the axum response body.

use axum::response::sse::Event;

use super::events::StreamEvent;

/// Payload of the final frame that closes a UI message stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE decoder.
///
/// Buffers bytes (not text) so a multi-byte UTF-8 character split across
/// network chunks is decoded only once the whole event has arrived.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the data payload of every event completed by them.
    ///
    /// Events with no `data:` lines (comments, keep-alives) are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = event_data(&event[..end]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        event_data(&rest)
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Join the `data:` lines of one event with `\n`, per the SSE format.
fn event_data(event: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(event);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| {
            line.strip_prefix("data:")
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Encode a stream event as one SSE frame carrying its JSON form.
pub fn to_sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stream event");
            Event::default().data(
                serde_json::json!({"type": "error", "errorText": "internal encoding error"})
                    .to_string(),
            )
        }
    }
}

/// The `[DONE]` trailer frame.
pub fn done_event() -> Event {
    Event::default().data(DONE_SENTINEL)
}
