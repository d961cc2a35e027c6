//! Mobile push notifications via Firebase Cloud Messaging.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use claim_core::config::NotificationConfig;
use claim_core::{PlanType, VerifyError, VerifyResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Device registration token.
    pub token: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// Message telling a user their campaign benefit was applied.
pub fn approval_message(token: impl Into<String>, plan: PlanType, months: u32) -> PushMessage {
    let benefit = match months {
        1 => "Your first month is free".to_string(),
        n => format!("{n} months free"),
    };
    let mut data = HashMap::new();
    data.insert("type".to_string(), "campaign_approved".to_string());
    data.insert("plan".to_string(), plan.to_string());
    data.insert("months".to_string(), months.to_string());
    PushMessage {
        token: token.into(),
        title: "Campaign benefit applied".to_string(),
        body: format!("{benefit}: the campaign benefit was applied automatically. Enjoy your training!"),
        data,
    }
}

/// Best-effort notification delivery. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &PushMessage) -> VerifyResult<()>;
}

/// Logs notifications instead of sending them (notifications disabled or no
/// server credentials).
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &PushMessage) -> VerifyResult<()> {
        tracing::info!(title = %message.title, body = %message.body, "Push notification (log only)");
        Ok(())
    }
}

pub struct FcmNotifier {
    client: Client,
    endpoint: String,
    server_token: String,
}

impl FcmNotifier {
    pub fn new(config: &NotificationConfig) -> VerifyResult<Self> {
        let server_token = config
            .fcm_server_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VerifyError::Config("FCM server token not configured".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VerifyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.fcm_endpoint.clone(),
            server_token,
        })
    }

    fn payload(message: &PushMessage) -> serde_json::Value {
        serde_json::json!({
            "to": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        })
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send(&self, message: &PushMessage) -> VerifyResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_token))
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| send_failed(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(send_failed(format!("FCM returned {status}: {body}")));
        }

        metrics::counter!("notification.sent").increment(1);
        tracing::info!(title = %message.title, "Push notification sent");
        Ok(())
    }
}

/// Every failed delivery is counted, whether FCM answered or not.
fn send_failed(reason: String) -> VerifyError {
    metrics::counter!("notification.failed").increment(1);
    VerifyError::Notification(reason)
}
