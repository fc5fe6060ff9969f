//! Inference Client: OpenAI-compatible chat completions.
//!
//! This module handles all communication with the completion endpoint:
//! - Streaming chat completions with tools on offer
//! - SSE stream parsing into tokens, reasoning fragments and tool calls
//! - Tool call fragment accumulation across deltas
//!
//! The orchestrator depends on the [`CompletionModel`] trait, not on the
//! concrete client, so the model is swappable via config and scriptable in
//! tests.

pub mod client;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::{CompletionModel, InferenceClient};
pub use errors::InferenceError;
pub use types::{ChatMessage, ChunkStream, Role, StreamChunk, ToolCall, ToolDefinition};
