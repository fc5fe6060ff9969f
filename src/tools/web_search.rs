//! `webSearch`: external market context when the review index has nothing.

use std::sync::Arc;

use super::errors::ToolError;
use super::types::{SearchProvider, WebSearchArgs, WebSearchOutput, MAX_WEB_RESULTS};

pub const TOOL_NAME: &str = "webSearch";

pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    default_num_results: u32,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, default_num_results: u32) -> Self {
        Self {
            provider,
            default_num_results: default_num_results.clamp(1, MAX_WEB_RESULTS),
        }
    }

    pub async fn run(&self, args: &WebSearchArgs) -> Result<WebSearchOutput, ToolError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: TOOL_NAME.to_string(),
                reason: "'query' must not be empty".to_string(),
            });
        }
        let num_results = args
            .num_results
            .unwrap_or(self.default_num_results)
            .clamp(1, MAX_WEB_RESULTS);

        let mut results = self.provider.search(query, num_results).await?;
        results.truncate(num_results as usize);

        tracing::info!(query, num_results, returned = results.len(), "web search complete");

        Ok(WebSearchOutput {
            query: query.to_string(),
            results,
        })
    }
}
