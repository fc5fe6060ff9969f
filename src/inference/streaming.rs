//! SSE streaming response parser for OpenAI-compatible chat completions.
//!
//! Reads the response body as a byte stream, splits it into SSE events,
//! parses each chunk as JSON, and accumulates tool calls across multiple
//! deltas.

use futures::stream::{self, Stream, StreamExt};
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ChatCompletionChunk, StreamChunk, ToolCall};
use crate::streaming::sse::{SseDecoder, DONE_SENTINEL};

// ─── SSE stream parser ───────────────────────────────────────────────────────

/// Parse a raw SSE byte stream into `StreamChunk`s.
///
/// This is the main entry point for streaming. It:
/// 1. Splits the HTTP body into SSE events
/// 2. Parses each `data:` payload as a `ChatCompletionChunk`
/// 3. Accumulates tool call fragments across deltas
/// 4. Emits a `StreamChunk` per meaningful event
pub fn parse_sse_stream<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<StreamChunk, InferenceError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let parser = ParserState {
        decoder: SseDecoder::new(),
        state: StreamState::default(),
        ready: std::collections::VecDeque::new(),
        done: false,
    };

    stream::unfold(
        (byte_stream, parser),
        |(mut byte_stream, mut parser)| async move {
            loop {
                if let Some(item) = parser.ready.pop_front() {
                    return Some((item, (byte_stream, parser)));
                }
                if parser.done {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        for payload in parser.decoder.push(bytes.as_ref()) {
                            parser.handle_payload(&payload);
                        }
                    }
                    Some(Err(e)) => {
                        parser.done = true;
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, parser),
                        ));
                    }
                    None => {
                        if let Some(payload) = parser.decoder.finish() {
                            parser.handle_payload(&payload);
                        }
                        if !parser.done {
                            parser.done = true;
                            match parser.state.finalize() {
                                Ok(Some(chunk)) => parser.ready.push_back(Ok(chunk)),
                                Ok(None) => {}
                                Err(e) => parser.ready.push_back(Err(e)),
                            }
                        }
                    }
                }
            }
        },
    )
}

/// Decoder plus chunks parsed but not yet yielded.
struct ParserState {
    decoder: SseDecoder,
    state: StreamState,
    ready: std::collections::VecDeque<Result<StreamChunk, InferenceError>>,
    done: bool,
}

impl ParserState {
    fn handle_payload(&mut self, payload: &str) {
        if self.done {
            return;
        }
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            self.done = true;
            match self.state.finalize() {
                Ok(Some(chunk)) => self.ready.push_back(Ok(chunk)),
                Ok(None) => {}
                Err(e) => self.ready.push_back(Err(e)),
            }
            return;
        }

        let parsed = serde_json::from_str::<ChatCompletionChunk>(payload)
            .map_err(|e| InferenceError::StreamError {
                reason: format!("failed to parse SSE chunk: {e} (data: {payload})"),
            })
            .and_then(|chunk| self.state.process_chunk(chunk));

        match parsed {
            Ok(Some(chunk)) => self.ready.push_back(Ok(chunk)),
            Ok(None) => {}
            Err(e) => {
                self.done = true;
                self.ready.push_back(Err(e));
            }
        }
    }
}

// ─── Stream State ────────────────────────────────────────────────────────────

/// An in-progress native tool call.
#[derive(Debug, Default)]
struct PendingToolCall {
    index: u32,
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Mutable state for accumulating tool call fragments across SSE events.
#[derive(Debug, Default)]
struct StreamState {
    pending_tool_calls: Vec<PendingToolCall>,
}

impl StreamState {
    /// Process a parsed `ChatCompletionChunk`.
    fn process_chunk(
        &mut self,
        chunk: ChatCompletionChunk,
    ) -> Result<Option<StreamChunk>, InferenceError> {
        let choice = match chunk.choices.into_iter().next() {
            Some(c) => c,
            None => return Ok(None), // usage-only trailer
        };

        let mut result = StreamChunk {
            token: choice.delta.content.filter(|c| !c.is_empty()),
            reasoning: choice.delta.reasoning.filter(|r| !r.is_empty()),
            tool_calls: None,
            finish_reason: choice.finish_reason,
        };

        if let Some(tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let index = tc.index.unwrap_or(0);
                let (name, args) = tc
                    .function
                    .map(|f| (f.name.unwrap_or_default(), f.arguments.unwrap_or_default()))
                    .unwrap_or_default();

                match self.pending_tool_calls.iter_mut().find(|p| p.index == index) {
                    Some(pending) => {
                        pending.name.push_str(&name);
                        pending.arguments.push_str(&args);
                        if tc.id.is_some() {
                            pending.id = tc.id;
                        }
                    }
                    None => self.pending_tool_calls.push(PendingToolCall {
                        index,
                        id: tc.id,
                        name,
                        arguments: args,
                    }),
                }
            }
        }

        if result.finish_reason.as_deref() == Some("tool_calls") {
            result.tool_calls = Some(self.finalize_tool_calls()?);
        }

        if result.token.is_none()
            && result.reasoning.is_none()
            && result.tool_calls.is_none()
            && result.finish_reason.is_none()
        {
            return Ok(None);
        }

        Ok(Some(result))
    }

    fn finalize_tool_calls(&mut self) -> Result<Vec<ToolCall>, InferenceError> {
        std::mem::take(&mut self.pending_tool_calls)
            .into_iter()
            .map(|p| parse_tool_call(p.id.as_deref(), &p.name, &p.arguments))
            .collect()
    }

    /// Emit any tool calls still pending when the stream ends.
    fn finalize(&mut self) -> Result<Option<StreamChunk>, InferenceError> {
        if self.pending_tool_calls.is_empty() {
            return Ok(None);
        }
        Ok(Some(StreamChunk::tool_calls(self.finalize_tool_calls()?)))
    }
}

/// Build a `ToolCall` from accumulated fragments.
///
/// Empty argument strings are treated as `{}`.
fn parse_tool_call(id: Option<&str>, name: &str, raw_args: &str) -> Result<ToolCall, InferenceError> {
    let arguments = if raw_args.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(raw_args).map_err(|e| InferenceError::ToolCallParseError {
            raw_response: raw_args.to_string(),
            reason: format!("invalid JSON arguments for '{name}': {e}"),
        })?
    };

    Ok(ToolCall {
        id: id
            .map(String::from)
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
        name: name.to_string(),
        arguments,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
