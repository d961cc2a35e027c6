use async_trait::async_trait;
use claim_core::{VerifyError, VerifyResult};
use serde::Serialize;

/// Binary answer of the content-quality classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Parse the classifier's raw answer by its leading token, ignoring case
    /// and trailing punctuation or explanation (`NG.`, `ok`, `NG\nreason`).
    /// An answer that starts with neither `OK` nor `NG` is malformed.
    pub fn parse(raw: &str) -> VerifyResult<Self> {
        let token: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        match token.as_str() {
            "OK" => Ok(Verdict::Pass),
            "NG" => Ok(Verdict::Fail),
            _ => Err(VerifyError::Classifier(format!(
                "unexpected classifier answer: {:?}",
                raw.trim()
            ))),
        }
    }
}

/// One judgment request: the post plus the criteria it must meet.
#[derive(Debug, Clone)]
pub struct QualityRequest {
    pub post_text: String,
    pub topic: String,
    pub min_description_chars: usize,
}

impl QualityRequest {
    pub fn criteria(&self) -> Vec<String> {
        vec![
            format!(
                "It describes a concrete personal experience (at least {} characters).",
                self.min_description_chars
            ),
            "It is not spam or meaningless content.".to_string(),
            "It is not purely promotional.".to_string(),
        ]
    }

    pub fn prompt(&self) -> String {
        let criteria = self
            .criteria()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Analyze the following social media post and decide whether it is an \
             appropriate testimonial about {topic}.\n\n\
             [Post]\n{post}\n\n\
             [Criteria]\n{criteria}\n\n\
             [Answer format]\nAnswer with only OK or NG.\n",
            topic = self.topic,
            post = self.post_text,
        )
    }
}

/// External semantic-quality judge.
#[async_trait]
pub trait QualityClassifier: Send + Sync {
    async fn classify(&self, request: &QualityRequest) -> VerifyResult<Verdict>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdicts() {
        assert_eq!(Verdict::parse("OK").unwrap(), Verdict::Pass);
        assert_eq!(Verdict::parse(" NG\n").unwrap(), Verdict::Fail);
        assert_eq!(Verdict::parse("ok").unwrap(), Verdict::Pass);
        assert_eq!(Verdict::parse("OK, looks fine").unwrap(), Verdict::Pass);
        assert!(Verdict::parse("").is_err());
        assert!(Verdict::parse("Maybe").is_err());
        assert!(Verdict::parse("OKAY").is_err());
    }

    #[test]
    fn test_rejection_with_punctuation_or_reason_is_fail() {
        assert_eq!(Verdict::parse("NG.").unwrap(), Verdict::Fail);
        assert_eq!(Verdict::parse("ng").unwrap(), Verdict::Fail);
        assert_eq!(
            Verdict::parse("NG\nThe post is purely promotional.").unwrap(),
            Verdict::Fail
        );
    }

    #[test]
    fn test_prompt_contains_post_and_criteria() {
        let request = QualityRequest {
            post_text: "Switched last month and my squat form improved".into(),
            topic: "switching to a new workout app".into(),
            min_description_chars: 10,
        };
        let prompt = request.prompt();
        assert!(prompt.contains("my squat form improved"));
        assert!(prompt.contains("at least 10 characters"));
        assert!(prompt.contains("3. It is not purely promotional."));
        assert!(prompt.contains("only OK or NG"));
    }
}
