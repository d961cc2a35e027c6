use serde::Deserialize;

use crate::benefit::PlanType;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CLAIM_VERIFIER__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub social: SocialSearchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// ─── External Services ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SocialSearchConfig {
    #[serde(default = "default_social_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// The recent-search endpoint accepts 10..=100.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

/// What the validator does when the semantic classifier cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFailurePolicy {
    /// Treat the semantic phase as passed; the deterministic phase decides.
    #[default]
    FailOpen,
    /// Propagate the failure to the caller.
    FailClosed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub failure_policy: ClassifierFailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_enabled")]
    pub enabled: bool,
    #[serde(default = "default_fcm_endpoint")]
    pub fcm_endpoint: String,
    #[serde(default)]
    pub fcm_server_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

// ─── Campaign Rules ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    #[serde(default = "default_required_hashtags")]
    pub required_hashtags: Vec<String>,
    /// Minimum length of the personal account, handed to the classifier.
    #[serde(default = "default_min_description_chars")]
    pub min_description_chars: usize,
    /// What the post is expected to be a testimonial about.
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_premium_benefit_months")]
    pub premium_benefit_months: u32,
    #[serde(default = "default_standard_benefit_months")]
    pub standard_benefit_months: u32,
}

impl CampaignConfig {
    /// Free months granted for an approved application on `plan`.
    pub fn benefit_months(&self, plan: PlanType) -> u32 {
        match plan {
            PlanType::Premium => self.premium_benefit_months,
            PlanType::Standard => self.standard_benefit_months,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// Age, measured from the reported post time, after which a `checking`
    /// application is considered stuck.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_social_base_url() -> String {
    "https://api.twitter.com".to_string()
}
fn default_max_results() -> u32 {
    10
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_classifier_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_classifier_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    10
}
fn default_notification_enabled() -> bool {
    true
}
fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}
fn default_required_hashtags() -> Vec<String> {
    vec!["#GymMatch乗り換え割".to_string(), "#AI筋トレ分析".to_string()]
}
fn default_min_description_chars() -> usize {
    10
}
fn default_topic() -> String {
    "switching to a new workout app".to_string()
}
fn default_premium_benefit_months() -> u32 {
    1
}
fn default_standard_benefit_months() -> u32 {
    2
}
fn default_sweeper_enabled() -> bool {
    true
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_stale_after_secs() -> u64 {
    300
}
fn default_max_commit_attempts() -> u32 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for SocialSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_social_base_url(),
            bearer_token: None,
            max_results: default_max_results(),
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_base_url(),
            model: default_classifier_model(),
            api_key: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_ms: default_request_timeout_ms(),
            failure_policy: ClassifierFailurePolicy::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notification_enabled(),
            fcm_endpoint: default_fcm_endpoint(),
            fcm_server_token: None,
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            required_hashtags: default_required_hashtags(),
            min_description_chars: default_min_description_chars(),
            topic: default_topic(),
            premium_benefit_months: default_premium_benefit_months(),
            standard_benefit_months: default_standard_benefit_months(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_secs: default_sweep_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CLAIM_VERIFIER")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("campaign.required_hashtags"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
