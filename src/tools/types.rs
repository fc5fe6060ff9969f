//! Tool arguments, results and the provider seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::ToolError;

pub const MAX_TOP_K: u32 = 20;
pub const MAX_WEB_RESULTS: u32 = 10;

// ─── Arguments ───────────────────────────────────────────────────────────────

/// Arguments of `vectorDatabaseSearch`. At least one of `query`/`asin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSearchArgs {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

/// Arguments of `webSearch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchArgs {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<u32>,
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// One retrieved review chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub asin: Option<String>,
    /// Similarity in [0, 1].
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Ok,
    /// Nothing relevant in the index; the model may fall back to web search.
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSearchOutput {
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
    pub passages: Vec<Passage>,
}

impl ReviewSearchOutput {
    pub fn no_data(asin: Option<String>) -> Self {
        Self {
            status: ReviewStatus::NoData,
            asin,
            passages: Vec::new(),
        }
    }

    pub fn is_relevant(&self) -> bool {
        self.status == ReviewStatus::Ok && !self.passages.is_empty()
    }
}

/// One web search hit with its display fallbacks already applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchOutput {
    pub query: String,
    pub results: Vec<WebResult>,
}

// ─── Provider seams ──────────────────────────────────────────────────────────

/// A similarity query against the review index.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewQuery {
    pub text: String,
    pub asin: Option<String>,
    pub top_k: u32,
}

/// Vector index of embedded reviews (Pinecone in production).
#[async_trait]
pub trait ReviewIndex: Send + Sync {
    /// Nearest passages, best first.
    async fn query(&self, query: &ReviewQuery) -> Result<Vec<Passage>, ToolError>;
}

/// General web search provider (Exa in production).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebResult>, ToolError>;

    /// Fails when the provider cannot serve any request (no credential).
    fn check_ready(&self) -> Result<(), ToolError> {
        Ok(())
    }
}
