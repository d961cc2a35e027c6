//! API server — HTTP REST endpoints plus the Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post, put};
use axum::Router;
use claim_core::config::ApiConfig;
use claim_store::ApplicationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: ApiConfig,
    store: Arc<ApplicationStore>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, store: Arc<ApplicationStore>) -> Self {
        Self { config, store }
    }

    pub fn router(&self) -> Router {
        let state = AppState::new(self.store.clone());

        Router::new()
            // Campaign applications
            .route("/v1/applications", post(rest::create_application))
            .route("/v1/applications/:id", get(rest::get_application))
            .route("/v1/applications/:id/submit", post(rest::submit_application))
            // Benefits and push targets
            .route("/v1/subscriptions/:user_id", get(rest::get_subscription))
            .route("/v1/users/:user_id/push-token", put(rest::put_push_token))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the HTTP REST server. Runs until the listener fails.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::new(self.config.host.parse()?, self.config.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Install the Prometheus recorder and serve it on the metrics port.
    /// Must be called from within the Tokio runtime.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.host.parse()?,
                self.config.metrics_port,
            ))
            .install()?;

        info!(port = self.config.metrics_port, "Metrics exporter started");
        Ok(())
    }
}
