//! Content validation for campaign posts: deterministic keyword rules
//! followed by an external semantic-quality check.

pub mod classifier;
pub mod gemini;
pub mod rules;
pub mod validator;

pub use classifier::{QualityClassifier, QualityRequest, Verdict};
pub use gemini::GeminiClassifier;
pub use rules::{RuleCheck, RuleSet};
pub use validator::{ContentValidator, SemanticOutcome, ValidationReport};
