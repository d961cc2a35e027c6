//! X (Twitter) API v2 recent-search client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claim_core::config::SocialSearchConfig;
use claim_core::{SocialPost, VerifyError, VerifyResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::locator::SocialSearch;

const RECENT_SEARCH_PATH: &str = "/2/tweets/search/recent";
const MIN_RESULTS: u32 = 10;
const MAX_RESULTS: u32 = 100;

/// Searches recent posts via `GET /2/tweets/search/recent`.
pub struct XSearchClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl XSearchClient {
    pub fn new(config: &SocialSearchConfig) -> VerifyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VerifyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, RECENT_SEARCH_PATH)
    }

    /// Query parameters for one search. The service rejects `max_results`
    /// outside 10..=100.
    fn query_params(query: &str, max_results: u32) -> [(&'static str, String); 3] {
        [
            ("query", query.to_string()),
            (
                "max_results",
                max_results.clamp(MIN_RESULTS, MAX_RESULTS).to_string(),
            ),
            ("tweet.fields", "created_at,text".to_string()),
        ]
    }

    fn status_error(status: StatusCode, body: &str) -> VerifyError {
        let kind = match status.as_u16() {
            401 | 403 => "authentication failed",
            429 => "rate limited",
            500..=599 => "server error",
            _ => "request rejected",
        };
        VerifyError::SocialSearch(format!("{kind} ({status}): {body}"))
    }

    fn parse_body(body: &str) -> VerifyResult<Vec<SocialPost>> {
        let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| {
            VerifyError::SocialSearch(format!("failed to parse search response: {e}"))
        })?;
        Ok(parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|t| SocialPost {
                id: t.id,
                text: t.text,
                created_at: t.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            })
            .collect())
    }
}

#[async_trait]
impl SocialSearch for XSearchClient {
    async fn search_recent(&self, query: &str, max_results: u32) -> VerifyResult<Vec<SocialPost>> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or_else(|| VerifyError::Config("social search bearer token not configured".into()))?;

        let response = self
            .client
            .get(self.endpoint())
            .bearer_auth(token)
            .query(&Self::query_params(query, max_results))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifyError::SocialSearch(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    VerifyError::SocialSearch(format!("connection failed: {e}"))
                } else {
                    VerifyError::SocialSearch(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }

        let posts = Self::parse_body(&body)?;
        tracing::debug!(count = posts.len(), "Recent search returned posts");
        Ok(posts)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<Tweet>>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = r##"{
            "data": [
                {"id": "1", "text": "#GM2025A3B7C9 great app", "created_at": "2025-03-01T10:00:00.000Z"},
                {"id": "2", "text": "another", "created_at": "2025-03-01T11:30:00.000Z"}
            ],
            "meta": {"result_count": 2}
        }"##;
        let posts = XSearchClient::parse_body(body).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id.as_deref(), Some("1"));
        assert_eq!(posts[1].created_at.to_rfc3339(), "2025-03-01T11:30:00+00:00");
    }

    #[test]
    fn test_parse_empty_result_has_no_data() {
        let posts = XSearchClient::parse_body(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(posts.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_search_error() {
        let err = XSearchClient::parse_body("<html>").unwrap_err();
        assert!(matches!(err, VerifyError::SocialSearch(_)));
    }

    #[test]
    fn test_query_params_clamp_result_count() {
        let params = XSearchClient::query_params("#GM2025A3B7C9", 3);
        assert_eq!(params[0].1, "#GM2025A3B7C9");
        assert_eq!(params[1].1, "10");
        assert_eq!(XSearchClient::query_params("x", 500)[1].1, "100");
        assert_eq!(params[2].1, "created_at,text");
    }

    #[test]
    fn test_status_error_kinds() {
        let err = XSearchClient::status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.to_string().contains("rate limited"));
        let err = XSearchClient::status_error(StatusCode::UNAUTHORIZED, "");
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let client = XSearchClient::new(&SocialSearchConfig::default()).unwrap();
        let err = client.search_recent("#GM2025A3B7C9", 10).await.unwrap_err();
        assert!(matches!(err, VerifyError::Config(_)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = SocialSearchConfig {
            base_url: "http://localhost:9000/".into(),
            ..Default::default()
        };
        let client = XSearchClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/2/tweets/search/recent");
    }
}
