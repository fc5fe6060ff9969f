//! Pinecone review index.
//!
//! Queries are embedded through the completion service's `/embeddings`
//! endpoint, then sent to the index data plane. The data-plane host is
//! either configured or resolved once from the control plane.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::errors::ToolError;
use super::types::{Passage, ReviewIndex, ReviewQuery};
use crate::config::{CompletionConfig, ReviewIndexConfig};

const PINECONE: &str = "pinecone";
const EMBEDDINGS: &str = "embeddings";

// ─── Embeddings ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct Embedder {
    http: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl Embedder {
    fn new(http: HttpClient, completion: &CompletionConfig, model: &str) -> Self {
        Self {
            http,
            base_url: completion.base_url.trim_end_matches('/').to_string(),
            api_key: completion.api_key.clone(),
            model: model.to_string(),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ToolError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({ "model": self.model, "input": [text] });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::request(EMBEDDINGS, e))?;

        if !response.status().is_success() {
            return Err(ToolError::upstream(EMBEDDINGS, response).await);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ToolError::decode(EMBEDDINGS, e))?;
        parsed.data.sort_by_key(|item| item.index);
        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ToolError::decode(EMBEDDINGS, "empty embedding response"))
    }
}

// ─── Index ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

pub struct PineconeIndex {
    http: HttpClient,
    host: String,
    api_key: String,
    namespace: Option<String>,
    embedder: Embedder,
}

impl PineconeIndex {
    /// Build the index client, resolving the data-plane host if needed.
    pub async fn connect(
        config: &ReviewIndexConfig,
        completion: &CompletionConfig,
    ) -> Result<Self, ToolError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::request(PINECONE, e))?;

        let host = match config.index_host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => host.to_string(),
            None => resolve_host(&http, config).await?,
        };
        let host = normalize_host(&host);
        tracing::info!(index = %config.index_name, host = %host, "review index ready");

        Ok(Self {
            embedder: Embedder::new(http.clone(), completion, &config.embedding_model),
            http,
            host,
            api_key: config.api_key.clone(),
            namespace: config.namespace.clone().filter(|n| !n.is_empty()),
        })
    }

    fn query_body(&self, vector: Vec<f32>, query: &ReviewQuery) -> serde_json::Value {
        let mut body = serde_json::json!({
            "vector": vector,
            "topK": query.top_k,
            "includeMetadata": true,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = serde_json::json!(ns);
        }
        if let Some(asin) = &query.asin {
            body["filter"] = serde_json::json!({ "asin": { "$eq": asin } });
        }
        body
    }
}

/// `GET {control_plane}/indexes/{name}` and read its `host`.
async fn resolve_host(http: &HttpClient, config: &ReviewIndexConfig) -> Result<String, ToolError> {
    let url = format!(
        "{}/indexes/{}",
        config.control_plane_url.trim_end_matches('/'),
        config.index_name
    );
    tracing::info!(url = %url, "resolving review index host");

    let response = http
        .get(&url)
        .header("Api-Key", &config.api_key)
        .send()
        .await
        .map_err(|e| ToolError::request(PINECONE, e))?;
    if !response.status().is_success() {
        return Err(ToolError::upstream(PINECONE, response).await);
    }
    let described: DescribeIndexResponse = response
        .json()
        .await
        .map_err(|e| ToolError::decode(PINECONE, e))?;
    Ok(described.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn metadata_str(metadata: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| metadata.get(*k))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn to_passage(m: QueryMatch, fallback_asin: Option<&str>) -> Passage {
    let rating = ["rating", "stars"]
        .iter()
        .filter_map(|k| m.metadata.get(*k))
        .find_map(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(|r| r as f32);
    Passage {
        text: metadata_str(&m.metadata, &["text", "review_text", "content", "body"])
            .unwrap_or_default(),
        asin: metadata_str(&m.metadata, &["asin"]).or_else(|| fallback_asin.map(String::from)),
        score: m.score,
        rating,
        title: metadata_str(&m.metadata, &["title", "review_title"]),
    }
}

#[async_trait]
impl ReviewIndex for PineconeIndex {
    async fn query(&self, query: &ReviewQuery) -> Result<Vec<Passage>, ToolError> {
        let vector = self.embedder.embed(&query.text).await?;
        let body = self.query_body(vector, query);
        let url = format!("{}/query", self.host);

        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::request(PINECONE, e))?;
        if !response.status().is_success() {
            return Err(ToolError::upstream(PINECONE, response).await);
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| ToolError::decode(PINECONE, e))?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| to_passage(m, query.asin.as_deref()))
            .collect())
    }
}
