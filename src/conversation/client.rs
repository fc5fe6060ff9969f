//! HTTP client for the chat backend.
//!
//! Posts the conversation held by a [`ConversationStore`] to `/api/chat` and
//! feeds the UI message stream back into it as events arrive.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::store::{ClientStatus, ConversationStore, StoreError};
use crate::streaming::sse::{SseDecoder, DONE_SENTINEL};
use crate::streaming::StreamEvent;
use crate::tools::WebResult;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("server returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("unreadable response: {reason}")]
    InvalidResponse { reason: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: e.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompetitorsBody {
    results: Vec<WebResult>,
}

pub struct ChatClient {
    http: HttpClient,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send `text` as the next user message and stream the reply into
    /// `store`. Returns the store status once the stream ends.
    pub async fn send(
        &self,
        store: &mut ConversationStore,
        text: &str,
    ) -> Result<ClientStatus, ClientError> {
        let messages = store.submit(text)?;

        let response = match self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({ "messages": messages }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                store.fail(e.to_string());
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            store.fail(format!("HTTP {status}"));
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    store.fail(format!("stream read error: {e}"));
                    return Err(e.into());
                }
            };
            for payload in decoder.push(&bytes) {
                apply_payload(store, &payload);
            }
            if !store.is_busy() {
                break;
            }
        }
        if let Some(payload) = decoder.finish() {
            apply_payload(store, &payload);
        }

        if store.is_busy() {
            tracing::warn!("chat stream ended without a terminal event");
            store.fail("The response ended unexpectedly.");
        }
        Ok(store.status())
    }

    /// Look up competing products for a keyword.
    pub async fn competitors(&self, keyword: &str) -> Result<Vec<WebResult>, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/competitors", self.base_url))
            .json(&json!({ "keyword": keyword }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let body: CompetitorsBody =
            response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse {
                    reason: e.to_string(),
                })?;
        Ok(body.results)
    }
}

fn apply_payload(store: &mut ConversationStore, payload: &str) {
    if payload.trim() == DONE_SENTINEL {
        return;
    }
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => {
            store.apply(event);
        }
        Err(e) => {
            tracing::debug!(error = %e, payload, "skipping unrecognised stream event");
        }
    }
}
