//! Review-first tool priority.
//!
//! Review search is always on offer. Web search becomes available only once
//! review search has come back empty or failed, or when the user asks about
//! the wider market without naming a product. Relevant review data turns web
//! search off for the rest of the request.

use crate::tools::asin::find_asins;
use crate::tools::{ToolKind, ToolOutcome};

const REVIEW_TERMS: [&str; 12] = [
    "review",
    "rating",
    "complaint",
    "complain",
    "stars",
    "star rating",
    "pros",
    "cons",
    "feedback",
    "return",
    "my product",
    "our product",
];

const MARKET_TERMS: [&str; 8] = [
    "market trend",
    "market context",
    "general expectation",
    "industry",
    "category trend",
    "what do customers usually expect",
    "usually expect",
    "in this category",
];

/// What the latest user message is asking about.
///
/// The policy keys on `asins` and `market_context`; `about_reviews` is only
/// reported in the orchestration log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIntent {
    pub asins: Vec<String>,
    pub about_reviews: bool,
    pub market_context: bool,
}

impl RequestIntent {
    pub fn classify(text: &str) -> Self {
        let asins = find_asins(text);
        let lower = text.to_lowercase();
        let about_reviews = !asins.is_empty() || REVIEW_TERMS.iter().any(|t| lower.contains(t));
        let market_context = MARKET_TERMS.iter().any(|t| lower.contains(t));
        Self {
            asins,
            about_reviews,
            market_context,
        }
    }

    pub fn names_asin(&self) -> bool {
        !self.asins.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ToolPolicy {
    intent: RequestIntent,
    review_missed: bool,
    review_relevant: bool,
}

impl ToolPolicy {
    pub fn new(intent: RequestIntent) -> Self {
        Self {
            intent,
            review_missed: false,
            review_relevant: false,
        }
    }

    pub fn allows(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::VectorDatabaseSearch => true,
            ToolKind::WebSearch => self.web_allowed(),
        }
    }

    fn web_allowed(&self) -> bool {
        if self.intent.market_context && !self.intent.names_asin() {
            return true;
        }
        !self.review_relevant && self.review_missed
    }

    /// Tools to offer the model this round, review search first.
    pub fn offered(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.allows(*k))
            .collect()
    }

    /// Explanation returned to the model for a call it may not make.
    pub fn rejection_reason(&self, kind: ToolKind) -> String {
        match kind {
            ToolKind::VectorDatabaseSearch => String::new(),
            ToolKind::WebSearch if self.review_relevant => {
                "webSearch is not available: vectorDatabaseSearch already returned relevant \
                 review passages. Answer from those passages."
                    .to_string()
            }
            ToolKind::WebSearch => {
                "webSearch is not available yet. Call vectorDatabaseSearch first; web search is \
                 only allowed when review search finds no data."
                    .to_string()
            }
        }
    }

    pub fn record(&mut self, kind: ToolKind, outcome: &ToolOutcome) {
        if kind != ToolKind::VectorDatabaseSearch {
            return;
        }
        match outcome {
            ToolOutcome::Reviews(out) if out.is_relevant() => self.review_relevant = true,
            other if other.review_miss() => self.review_missed = true,
            _ => {}
        }
    }
}
