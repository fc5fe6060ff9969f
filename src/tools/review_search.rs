//! `vectorDatabaseSearch`: retrieval over ingested product reviews.

use std::sync::Arc;

use super::asin::{first_asin, is_asin};
use super::errors::ToolError;
use super::types::{
    Passage, ReviewIndex, ReviewQuery, ReviewSearchArgs, ReviewSearchOutput, ReviewStatus,
    MAX_TOP_K,
};

pub const TOOL_NAME: &str = "vectorDatabaseSearch";

pub struct ReviewSearchTool {
    index: Arc<dyn ReviewIndex>,
    default_top_k: u32,
    min_score: f32,
}

impl ReviewSearchTool {
    pub fn new(index: Arc<dyn ReviewIndex>, default_top_k: u32, min_score: f32) -> Self {
        Self {
            index,
            default_top_k: default_top_k.clamp(1, MAX_TOP_K),
            min_score,
        }
    }

    /// Build the index query from the model's arguments.
    ///
    /// An explicit `asin` wins; otherwise an ASIN found in the query text is
    /// used as the metadata filter. An explicit value that is not an ASIN
    /// (a product URL, say) contributes the first ASIN inside it, or nothing.
    pub fn plan_query(&self, args: &ReviewSearchArgs) -> Result<ReviewQuery, ToolError> {
        let query = normalized(args.query.as_deref());
        let asin = normalized(args.asin.as_deref())
            .and_then(|a| explicit_asin(&a.to_uppercase()))
            .or_else(|| query.as_deref().and_then(first_asin));

        let text = match (&query, &asin) {
            (Some(q), _) => q.clone(),
            (None, Some(a)) => format!("customer reviews for product {a}"),
            (None, None) => {
                return Err(ToolError::InvalidArguments {
                    tool: TOOL_NAME.to_string(),
                    reason: "either 'query' or 'asin' is required".to_string(),
                })
            }
        };

        let top_k = args
            .top_k
            .unwrap_or(self.default_top_k)
            .clamp(1, MAX_TOP_K);

        Ok(ReviewQuery { text, asin, top_k })
    }

    pub async fn run(&self, args: &ReviewSearchArgs) -> Result<ReviewSearchOutput, ToolError> {
        let query = self.plan_query(args)?;
        let raw = self.index.query(&query).await?;
        let raw_count = raw.len();

        let passages = rank_passages(raw, self.min_score, query.top_k as usize);

        tracing::info!(
            asin = ?query.asin,
            top_k = query.top_k,
            raw_count,
            kept = passages.len(),
            "review search complete"
        );

        if passages.is_empty() {
            return Ok(ReviewSearchOutput::no_data(query.asin));
        }
        Ok(ReviewSearchOutput {
            status: ReviewStatus::Ok,
            asin: query.asin,
            passages,
        })
    }
}

/// Clamp scores to [0, 1], drop weak matches, best first, at most `limit`.
fn rank_passages(raw: Vec<Passage>, min_score: f32, limit: usize) -> Vec<Passage> {
    let mut passages: Vec<Passage> = raw
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|mut p| {
            p.score = if p.score.is_nan() { 0.0 } else { p.score.clamp(0.0, 1.0) };
            p
        })
        .filter(|p| p.score >= min_score)
        .collect();
    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
    passages.truncate(limit);
    passages
}

fn explicit_asin(raw: &str) -> Option<String> {
    if is_asin(raw) {
        return Some(raw.to_string());
    }
    let found = first_asin(raw);
    if found.is_none() {
        tracing::warn!(asin = %raw, "ignoring malformed asin argument");
    }
    found
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
