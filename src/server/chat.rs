//! `POST /api/chat`: a UI message stream over SSE.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use super::errors::ApiError;
use super::SharedState;
use crate::conversation::Message;
use crate::streaming::sse::{done_event, to_sse_event};

/// Marks the body as a UI message stream for the browser client.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

pub async fn chat(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::Validation {
            error: "Invalid request body".to_string(),
            details: Some(e.to_string()),
        })?;

    let (rx, cancel) = state.pipeline.spawn(request.messages);
    // Dropping the body (client disconnect) cancels the request task.
    let guard = cancel.drop_guard();

    let events = ReceiverStream::new(rx)
        .map(move |event| {
            let _guard = &guard;
            Ok::<Event, Infallible>(to_sse_event(&event))
        })
        .chain(stream::once(async { Ok(done_event()) }));

    Ok((
        [(UI_STREAM_HEADER, "v1")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}
