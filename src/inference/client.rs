//! OpenAI-compatible inference client.
//!
//! Sends streaming chat completion requests to the configured completion
//! endpoint and hands back a stream of tokens, reasoning fragments and tool
//! calls. There is no automatic retry: failures surface to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::streaming::parse_sse_stream;
use super::types::{ChatCompletionRequest, ChatMessage, ChunkStream, ToolDefinition};
use crate::config::CompletionConfig;

// ─── CompletionModel ─────────────────────────────────────────────────────────

/// One model-decision round: send the conversation plus the tools on offer,
/// get back the streamed response.
///
/// Implemented by [`InferenceClient`]; tests substitute scripted models.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn stream_round(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ChunkStream, InferenceError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the completion endpoint.
///
/// Built once at startup from [`CompletionConfig`] and shared across requests.
pub struct InferenceClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    stream_timeout: Duration,
}

impl InferenceClient {
    /// Create a new inference client. Does NOT check connectivity; that
    /// happens on the first request.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, InferenceError> {
        let stream_timeout = Duration::from_secs(config.stream_timeout_secs);
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(stream_timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream_timeout,
        })
    }

    fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> ChatCompletionRequest {
        let tools = if tools.is_empty() { None } else { Some(tools) };
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            parallel_tool_calls: tools.as_ref().map(|_| false),
            tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionModel for InferenceClient {
    async fn stream_round(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ChunkStream, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(messages, tools);

        // Request metadata only; the body can be huge.
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_names = ?body
                .tools
                .as_ref()
                .map(|t| t.iter().map(|d| d.function.name.as_str()).collect::<Vec<_>>())
                .unwrap_or_default(),
            "=== LLM REQUEST ==="
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.stream_timeout.as_secs(),
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(Box::pin(parse_sse_stream(response.bytes_stream())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
