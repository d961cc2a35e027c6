use serde::Serialize;

/// The campaign's deterministic requirements.
#[derive(Debug, Clone)]
pub struct RuleSet {
    required_hashtags: Vec<String>,
}

/// Which deterministic requirements a post met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCheck {
    pub has_unique_code: bool,
    pub missing_hashtags: Vec<String>,
}

impl RuleCheck {
    /// All-or-nothing: the code and every hashtag must be present.
    pub fn passed(&self) -> bool {
        self.has_unique_code && self.missing_hashtags.is_empty()
    }
}

impl RuleSet {
    pub fn new(required_hashtags: Vec<String>) -> Self {
        Self { required_hashtags }
    }

    pub fn required_hashtags(&self) -> &[String] {
        &self.required_hashtags
    }

    /// Verbatim, case-sensitive substring checks.
    pub fn check(&self, text: &str, unique_code: &str) -> RuleCheck {
        RuleCheck {
            has_unique_code: !unique_code.is_empty() && text.contains(unique_code),
            missing_hashtags: self
                .required_hashtags
                .iter()
                .filter(|tag| !text.contains(tag.as_str()))
                .cloned()
                .collect(),
        }
    }
}
