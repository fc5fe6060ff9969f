//! Streaming Response Assembler.
//!
//! - `events`: the UI message stream event types
//! - `sink`: bounded-channel producer used by the orchestration task
//! - `sse`: SSE framing in both directions

pub mod events;
pub mod sink;
pub mod sse;

pub use events::{denial_events, FinishReason, StreamEvent};
pub use sink::{channel, EventSink};
