//! Exa web search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::errors::ToolError;
use super::types::{SearchProvider, WebResult};
use crate::config::{WebSearchConfig, EXA_API_KEY_ENV};

const PROVIDER: &str = "exa";
const SNIPPET_CHARS: usize = 200;
const UNTITLED: &str = "Untitled result";
const NO_SNIPPET: &str = "No snippet available.";

pub struct ExaClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl ExaClient {
    pub fn from_config(config: &WebSearchConfig) -> Result<Self, ToolError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::request(PROVIDER, e))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    title: Option<String>,
    url: Option<String>,
    snippet: Option<String>,
    text: Option<String>,
}

impl From<RawResult> for WebResult {
    fn from(raw: RawResult) -> Self {
        let url = raw.url.unwrap_or_default();
        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| UNTITLED.to_string());
        let snippet = raw
            .snippet
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                raw.text
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| t.chars().take(SNIPPET_CHARS).collect())
            })
            .unwrap_or_else(|| NO_SNIPPET.to_string());
        Self {
            title,
            url,
            snippet,
        }
    }
}

#[async_trait]
impl SearchProvider for ExaClient {
    fn check_ready(&self) -> Result<(), ToolError> {
        if self.api_key.is_empty() {
            return Err(ToolError::MissingCredential {
                var: EXA_API_KEY_ENV,
            });
        }
        Ok(())
    }

    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebResult>, ToolError> {
        self.check_ready()?;

        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "query": query,
            "numResults": num_results,
            "contents": { "text": { "maxCharacters": 1000 } },
        });

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::request(PROVIDER, e))?;

        if !response.status().is_success() {
            let err = ToolError::upstream(PROVIDER, response).await;
            tracing::warn!(error = %err, "exa search failed");
            return Err(err);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::decode(PROVIDER, e))?;
        Ok(parsed.results.into_iter().map(WebResult::from).collect())
    }
}
