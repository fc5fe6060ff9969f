//! The moderation gate in front of the orchestrator.

use std::sync::Arc;

use super::classifier::ModerationClassifier;
use super::types::ModerationVerdict;
use crate::conversation::types::{latest_user_text, Message};

pub struct ModerationGate {
    classifier: Arc<dyn ModerationClassifier>,
    fail_open: bool,
}

impl ModerationGate {
    pub fn new(classifier: Arc<dyn ModerationClassifier>, fail_open: bool) -> Self {
        Self {
            classifier,
            fail_open,
        }
    }

    /// Verdict for one user text. Empty text is never sent to the classifier.
    pub async fn check(&self, text: &str) -> ModerationVerdict {
        if text.trim().is_empty() {
            return ModerationVerdict::allowed();
        }

        match self.classifier.classify(text).await {
            Ok(classification) => {
                let verdict = ModerationVerdict::from_classification(&classification);
                if verdict.flagged {
                    tracing::info!(category = ?verdict.category, "message blocked by moderation");
                }
                verdict
            }
            Err(e) if self.fail_open => {
                tracing::warn!(error = %e, "moderation unavailable, allowing message");
                ModerationVerdict::allowed()
            }
            Err(e) => {
                tracing::warn!(error = %e, "moderation unavailable, blocking message");
                ModerationVerdict::blocked(None)
            }
        }
    }

    /// Check the latest user message of a conversation.
    pub async fn check_conversation(&self, messages: &[Message]) -> ModerationVerdict {
        match latest_user_text(messages) {
            Some(text) => self.check(&text).await,
            None => ModerationVerdict::allowed(),
        }
    }
}
