use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sent when a message is blocked without a more specific denial.
pub const GENERIC_DENIAL: &str = "Your message violates our guidelines. I can't answer that.";

pub const DENIAL_ILLEGAL: &str = "I analyze Amazon product reviews and business questions only. I can't assist with illegal, harmful, or policy-violating requests.";
pub const DENIAL_SEXUAL: &str = "I can help with professional Amazon product and business topics only — not explicit or sexual content.";
pub const DENIAL_VIOLENCE: &str = "I’m here for Amazon product and business questions — not violent or harmful requests.";
pub const DENIAL_SELF_HARM: &str = "I can only help with Amazon product and business questions. If you are going through something difficult, please reach out to someone you trust or a local support line.";
pub const DENIAL_HATE: &str = "I'm here for Amazon product and business questions and can't engage with hateful content.";
pub const DENIAL_HARASSMENT: &str = "I can help with Amazon product and business topics only, not content that targets or harasses people.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationCategory {
    Illegal,
    Sexual,
    Violence,
    SelfHarm,
    Hate,
    Harassment,
    Other,
}

/// Classifier category prefixes in the order they decide the verdict.
const CATEGORY_PRIORITY: [(&str, ModerationCategory); 7] = [
    ("sexual/minors", ModerationCategory::Illegal),
    ("self-harm", ModerationCategory::SelfHarm),
    ("violence", ModerationCategory::Violence),
    ("illicit", ModerationCategory::Illegal),
    ("hate", ModerationCategory::Hate),
    ("harassment", ModerationCategory::Harassment),
    ("sexual", ModerationCategory::Sexual),
];

impl ModerationCategory {
    pub fn denial_message(self) -> &'static str {
        match self {
            Self::Illegal => DENIAL_ILLEGAL,
            Self::Sexual => DENIAL_SEXUAL,
            Self::Violence => DENIAL_VIOLENCE,
            Self::SelfHarm => DENIAL_SELF_HARM,
            Self::Hate => DENIAL_HATE,
            Self::Harassment => DENIAL_HARASSMENT,
            Self::Other => GENERIC_DENIAL,
        }
    }

    /// Pick the deciding category from the classifier's per-category flags.
    ///
    /// `violence/graphic` counts as `violence`; `sexual/minors` is matched
    /// before plain `sexual`.
    pub fn from_flags(flags: &HashMap<String, bool>) -> Option<Self> {
        CATEGORY_PRIORITY.iter().find_map(|(prefix, category)| {
            let hit = flags.iter().any(|(name, flagged)| {
                *flagged
                    && name
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            });
            hit.then_some(*category)
        })
    }
}

/// Raw classifier answer for one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub flagged: bool,
    pub categories: HashMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub denial_message: Option<String>,
    pub category: Option<ModerationCategory>,
}

impl ModerationVerdict {
    pub fn allowed() -> Self {
        Self {
            flagged: false,
            denial_message: None,
            category: None,
        }
    }

    pub fn blocked(category: Option<ModerationCategory>) -> Self {
        Self {
            flagged: true,
            denial_message: category.map(|c| c.denial_message().to_string()),
            category,
        }
    }

    pub fn from_classification(c: &Classification) -> Self {
        let category = ModerationCategory::from_flags(&c.categories);
        if !c.flagged && category.is_none() {
            return Self::allowed();
        }
        Self::blocked(Some(category.unwrap_or(ModerationCategory::Other)))
    }

    /// Text shown to the user in place of an answer.
    pub fn denial_text(&self) -> &str {
        self.denial_message
            .as_deref()
            .or_else(|| self.category.map(ModerationCategory::denial_message))
            .unwrap_or(GENERIC_DENIAL)
    }
}
