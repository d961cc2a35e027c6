//! Claim Verifier — automated verification of social-media campaign claims.
//!
//! Wires the store, the external service clients and the verification
//! pipeline together, then serves the HTTP API.

use claim_api::ApiServer;
use claim_channels::{FcmNotifier, LogNotifier, Notifier};
use claim_content::{ContentValidator, GeminiClassifier};
use claim_core::config::AppConfig;
use claim_core::event_bus::{EventSink, TracingSink};
use claim_ledger::BenefitLedger;
use claim_pipeline::{Orchestrator, RetrySweeper, VerificationTrigger};
use claim_social::{PostLocator, XSearchClient};
use claim_store::ApplicationStore;
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "claim-verifier")]
#[command(about = "Automated verification of social-media campaign claims")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML/YAML/JSON, extension optional)
    #[arg(long, env = "CLAIM_VERIFIER_CONFIG")]
    config: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CLAIM_VERIFIER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "CLAIM_VERIFIER__API__METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Sweep interval in seconds (overrides config)
    #[arg(long, env = "CLAIM_VERIFIER__SWEEPER__INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    /// Disable the retry sweeper
    #[arg(long, default_value_t = false)]
    no_sweeper: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "claim_verifier=info,claim_pipeline=info,claim_ledger=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Claim Verifier starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.api.metrics_port = port;
    }
    if let Some(secs) = cli.sweep_interval_secs {
        config.sweeper.interval_secs = secs;
    }
    if cli.no_sweeper {
        config.sweeper.enabled = false;
    }

    info!(
        http_port = config.api.http_port,
        metrics_port = config.api.metrics_port,
        hashtags = ?config.campaign.required_hashtags,
        sweeper = config.sweeper.enabled,
        "Configuration loaded"
    );

    let store = Arc::new(ApplicationStore::with_max_attempts(
        config.ledger.max_commit_attempts,
    ));
    let events: Arc<dyn EventSink> = Arc::new(TracingSink);

    if config.social.bearer_token.is_none() {
        warn!("No social search bearer token configured, every lookup will report post not found");
    }
    let search = Arc::new(XSearchClient::new(&config.social)?);
    let locator = Arc::new(PostLocator::new(search, config.social.max_results));

    // A missing key is a deployment error, not a classifier outage.
    let classifier = Arc::new(
        GeminiClassifier::new(&config.classifier)
            .context("classifier.api_key (CLAIM_VERIFIER__CLASSIFIER__API_KEY) must be set")?,
    );
    let validator = Arc::new(ContentValidator::new(
        &config.campaign,
        classifier,
        config.classifier.failure_policy,
    ));

    let ledger = Arc::new(BenefitLedger::new(store.clone(), &config.campaign));

    let notifier: Arc<dyn Notifier> = if !config.notification.enabled {
        info!("Push notifications disabled, logging only");
        Arc::new(LogNotifier)
    } else {
        match FcmNotifier::new(&config.notification) {
            Ok(fcm) => Arc::new(fcm),
            Err(e) => {
                warn!(error = %e, "FCM unavailable, logging notifications instead");
                Arc::new(LogNotifier)
            }
        }
    };

    let orchestrator = Arc::new(
        Orchestrator::new(store.clone(), locator, validator, ledger, notifier)
            .with_event_sink(events.clone()),
    );

    let trigger = VerificationTrigger::new(orchestrator).spawn(store.subscribe());

    let sweeper = if config.sweeper.enabled {
        Some(
            RetrySweeper::new(store.clone(), &config.sweeper)
                .with_event_sink(events)
                .spawn(),
        )
    } else {
        info!("Retry sweeper disabled");
        None
    };

    let api_server = ApiServer::new(config.api.clone(), store);
    if let Err(e) = api_server.start_metrics() {
        warn!(error = %e, "Failed to start metrics exporter");
    }

    info!("Claim Verifier is ready to serve traffic");

    let result = api_server.start_http().await;

    trigger.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result
}
