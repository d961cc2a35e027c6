//! Gemini `generateContent` client used as the content-quality classifier.

use std::time::Duration;

use async_trait::async_trait;
use claim_core::config::ClassifierConfig;
use claim_core::{VerifyError, VerifyResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::classifier::{QualityClassifier, QualityRequest, Verdict};

pub struct GeminiClassifier {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiClassifier {
    /// Fails with a configuration error when no API key is set: without one
    /// no call is ever made, and that must not be mistaken for an outage.
    pub fn new(config: &ClassifierConfig) -> VerifyResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VerifyError::Config("classifier API key not configured".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VerifyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, request: &QualityRequest) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    /// Pull the first candidate's text out of a response body.
    fn extract_answer(body: &str) -> VerifyResult<String> {
        let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
            VerifyError::Classifier(format!("failed to parse response: {e}"))
        })?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| VerifyError::Classifier("no candidates in response".into()))
    }
}

#[async_trait]
impl QualityClassifier for GeminiClassifier {
    async fn classify(&self, request: &QualityRequest) -> VerifyResult<Verdict> {
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(VerifyError::Classifier(format!(
                "classifier returned {status}: {body}"
            )));
        }

        let answer = Self::extract_answer(&body)?;
        tracing::debug!(answer = %answer.trim(), "Classifier answered");
        Verdict::parse(&answer)
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Transport failures carry no URL.
fn transport_error(e: reqwest::Error) -> VerifyError {
    let kind = if e.is_timeout() {
        "request timeout"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    VerifyError::Classifier(format!("{kind}: {}", e.without_url()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}
