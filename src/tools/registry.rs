//! The fixed tool set offered to the model, and dispatch over it.

use serde_json::{json, Value};

use super::errors::ToolError;
use super::review_search::{self, ReviewSearchTool};
use super::types::{
    ReviewSearchArgs, ReviewSearchOutput, WebSearchArgs, WebSearchOutput, MAX_TOP_K,
    MAX_WEB_RESULTS,
};
use super::web_search::{self, WebSearchTool};
use crate::inference::types::FunctionDefinition;
use crate::inference::ToolDefinition;

/// Bumped whenever a tool's name, arguments or result shape changes.
pub const TOOL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    VectorDatabaseSearch,
    WebSearch,
}

/// Parsed, typed arguments for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    Reviews(ReviewSearchArgs),
    Web(WebSearchArgs),
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::VectorDatabaseSearch, ToolKind::WebSearch];

    pub fn name(self) -> &'static str {
        match self {
            Self::VectorDatabaseSearch => review_search::TOOL_NAME,
            Self::WebSearch => web_search::TOOL_NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            Self::VectorDatabaseSearch => (
                "Search the seller's ingested Amazon product reviews. Always try this first \
                 for any question about a product's reviews, ratings, complaints or feedback. \
                 Pass the ASIN when the user gives one. Returns matching review passages, or \
                 status \"no_data\" when nothing relevant is indexed.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to look for in the reviews, in plain language."
                        },
                        "asin": {
                            "type": "string",
                            "description": "Amazon ASIN to restrict the search to, e.g. B09XYZ1234."
                        },
                        "topK": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_TOP_K,
                            "description": "How many passages to return (default 8)."
                        }
                    }
                }),
            ),
            Self::WebSearch => (
                "Search the public web for market trends, category expectations or competitor \
                 context. Only use this when review search returned no data or failed, or when \
                 the user explicitly asks about the wider market.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query."
                        },
                        "numResults": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_WEB_RESULTS,
                            "description": "How many results to return (default 5)."
                        }
                    },
                    "required": ["query"]
                }),
            ),
        };
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn parse_args(self, args: &Value) -> Result<ToolArgs, ToolError> {
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: self.name().to_string(),
            reason: e.to_string(),
        };
        match self {
            Self::VectorDatabaseSearch => serde_json::from_value(args.clone())
                .map(ToolArgs::Reviews)
                .map_err(invalid),
            Self::WebSearch => serde_json::from_value(args.clone())
                .map(ToolArgs::Web)
                .map_err(invalid),
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// The result of one tool call as fed back to the model and the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Reviews(ReviewSearchOutput),
    WebResults(WebSearchOutput),
    /// The adapter ran (or tried to) and failed.
    Failed { tool: String, message: String },
    /// The arguments were unusable; no provider was called.
    Invalid { tool: String, reason: String },
    /// The call was not dispatched because the tool was not available.
    Rejected { tool: String, reason: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::Invalid { .. } | Self::Rejected { .. }
        )
    }

    /// Review search reached the index and came back empty or failed.
    pub fn review_miss(&self) -> bool {
        match self {
            Self::Reviews(out) => !out.is_relevant(),
            Self::Failed { tool, .. } => tool == review_search::TOOL_NAME,
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Reviews(out) => serde_json::to_value(out)
                .unwrap_or_else(|e| json!({"status": "error", "error": e.to_string()})),
            Self::WebResults(out) => serde_json::to_value(out)
                .map(|mut v| {
                    v["status"] = json!("ok");
                    v
                })
                .unwrap_or_else(|e| json!({"status": "error", "error": e.to_string()})),
            Self::Failed { message, .. } => json!({"status": "error", "error": message}),
            Self::Invalid { tool, reason } => json!({
                "status": "error",
                "error": format!("Invalid arguments for {tool}: {reason}"),
            }),
            Self::Rejected { tool, reason } => json!({
                "status": "error",
                "error": reason,
                "rejectedTool": tool,
            }),
        }
    }
}

// ─── Toolbox ─────────────────────────────────────────────────────────────────

pub struct Toolbox {
    reviews: ReviewSearchTool,
    web: WebSearchTool,
}

impl Toolbox {
    pub fn new(reviews: ReviewSearchTool, web: WebSearchTool) -> Self {
        Self { reviews, web }
    }

    /// Run one tool. Never fails: errors become [`ToolOutcome::Failed`].
    pub async fn invoke(&self, kind: ToolKind, raw_args: &Value) -> ToolOutcome {
        let args = match kind.parse_args(raw_args) {
            Ok(args) => args,
            Err(e) => return failed(kind, e),
        };

        let result = match args {
            ToolArgs::Reviews(a) => self.reviews.run(&a).await.map(ToolOutcome::Reviews),
            ToolArgs::Web(a) => self.web.run(&a).await.map(ToolOutcome::WebResults),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(tool = kind.name(), error = %e, "tool call failed");
            failed(kind, e)
        })
    }
}

fn failed(kind: ToolKind, err: ToolError) -> ToolOutcome {
    if let ToolError::InvalidArguments { reason, .. } = err {
        return ToolOutcome::Invalid {
            tool: kind.name().to_string(),
            reason,
        };
    }
    let message = match kind {
        ToolKind::VectorDatabaseSearch => format!("Review search failed: {err}"),
        ToolKind::WebSearch => format!("External data could not be retrieved: {err}"),
    };
    ToolOutcome::Failed {
        tool: kind.name().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeIndex, FakeSearch};
    use std::sync::Arc;

    fn toolbox(index: FakeIndex, search: FakeSearch) -> Toolbox {
        Toolbox::new(
            ReviewSearchTool::new(Arc::new(index), 8, 0.3),
            WebSearchTool::new(Arc::new(search), 5),
        )
    }

    #[test]
    fn test_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("deleteAllProducts"), None);
    }

    #[test]
    fn test_definitions() {
        let def = ToolKind::WebSearch.definition();
        assert_eq!(def.r#type, "function");
        assert_eq!(def.function.name, "webSearch");
        assert_eq!(def.function.parameters["required"], json!(["query"]));
        let def = ToolKind::VectorDatabaseSearch.definition();
        assert!(def.function.parameters["properties"]["asin"].is_object());
    }

    #[test]
    fn test_parse_args_rejects_wrong_types() {
        let err = ToolKind::WebSearch
            .parse_args(&json!({"query": 42}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_web_failure_is_structured_result() {
        let tools = toolbox(FakeIndex::empty(), FakeSearch::failing(502));
        let outcome = tools
            .invoke(ToolKind::WebSearch, &json!({"query": "trends"}))
            .await;
        assert!(outcome.is_error());
        let value = outcome.to_value();
        assert_eq!(value["status"], "error");
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("External data could not be retrieved"));
    }

    #[tokio::test]
    async fn test_review_no_data_is_a_miss_not_an_error() {
        let tools = toolbox(FakeIndex::empty(), FakeSearch::with_results(vec![]));
        let outcome = tools
            .invoke(ToolKind::VectorDatabaseSearch, &json!({"asin": "B09XYZ1234"}))
            .await;
        assert!(!outcome.is_error());
        assert!(outcome.review_miss());
        assert_eq!(outcome.to_value()["status"], "no_data");
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_not_a_review_miss() {
        let index = Arc::new(FakeIndex::empty());
        let tools = Toolbox::new(
            ReviewSearchTool::new(index.clone(), 8, 0.3),
            WebSearchTool::new(Arc::new(FakeSearch::with_results(vec![])), 5),
        );
        for args in [json!({}), json!({"topK": "eight"})] {
            let outcome = tools.invoke(ToolKind::VectorDatabaseSearch, &args).await;
            assert!(matches!(outcome, ToolOutcome::Invalid { .. }));
            assert!(outcome.is_error());
            assert!(!outcome.review_miss());
            assert_eq!(outcome.to_value()["status"], "error");
        }
        assert!(index.queries().is_empty());
    }

    #[tokio::test]
    async fn test_index_outage_is_a_review_miss() {
        let tools = toolbox(FakeIndex::failing(), FakeSearch::with_results(vec![]));
        let outcome = tools
            .invoke(ToolKind::VectorDatabaseSearch, &json!({"asin": "B09XYZ1234"}))
            .await;
        assert!(matches!(outcome, ToolOutcome::Failed { .. }));
        assert!(outcome.review_miss());
        assert!(outcome.to_value()["error"]
            .as_str()
            .unwrap()
            .starts_with("Review search failed"));
    }

    #[test]
    fn test_rejected_value() {
        let outcome = ToolOutcome::Rejected {
            tool: "webSearch".to_string(),
            reason: "Use vectorDatabaseSearch first.".to_string(),
        };
        let value = outcome.to_value();
        assert_eq!(value["status"], "error");
        assert_eq!(value["rejectedTool"], "webSearch");
        assert!(!outcome.review_miss());
    }
}
