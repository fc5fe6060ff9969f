//! Moderation classifier client (OpenAI `/moderations`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::errors::ModerationError;
use super::types::Classification;
use crate::config::ModerationConfig;

#[async_trait]
pub trait ModerationClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ModerationError>;
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: HashMap<String, bool>,
}

pub struct OpenAiModerationClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiModerationClient {
    pub fn from_config(config: &ModerationConfig, api_key: &str) -> Result<Self, ModerationError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModerationError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ModerationClassifier for OpenAiModerationClient {
    async fn classify(&self, text: &str) -> Result<Classification, ModerationError> {
        let url = format!("{}/moderations", self.base_url);
        let body = serde_json::json!({ "model": self.model, "input": text });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModerationError::Timeout {
                        duration_secs: self.timeout_secs,
                    }
                } else {
                    ModerationError::RequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ModerationResponse =
            response
                .json()
                .await
                .map_err(|e| ModerationError::InvalidResponse {
                    reason: e.to_string(),
                })?;
        let first = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ModerationError::InvalidResponse {
                reason: "response has no results".to_string(),
            })?;

        Ok(Classification {
            flagged: first.flagged,
            categories: first.categories,
        })
    }
}
