//! HTTP request handlers for the turnselect API

use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id::request_id_middleware;
use crate::relay::{Evaluate, HealthCache, HealthEvaluator, RelaySelector, ServerDescriptor};

pub mod health;
pub mod metrics;
pub mod turn;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    servers: Arc<Vec<ServerDescriptor>>,
    selector: Arc<RelaySelector>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// An invalid registry is logged and leaves the state with zero servers,
    /// so every selection answers "no server" until the config is fixed.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let servers = match config.servers() {
            Ok(servers) => {
                tracing::info!(
                    configured_servers = servers.len(),
                    "Loaded TURN server registry"
                );
                servers
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "TURN server registry is invalid; no server will be selected until it is fixed"
                );
                Vec::new()
            }
        };

        let evaluator = Arc::new(HealthEvaluator::new(&config.health)?);
        Self::with_evaluator(config, servers, evaluator)
    }

    /// Create state with an explicit server list and evaluator
    pub fn with_evaluator(
        config: Arc<Config>,
        servers: Vec<ServerDescriptor>,
        evaluator: Arc<dyn Evaluate>,
    ) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to register Prometheus metrics: {}", e))
        })?);

        let cache = Arc::new(HealthCache::new_with_metrics(
            evaluator,
            config.health.cache_ttl(),
            metrics.clone(),
        ));
        let selector = Arc::new(RelaySelector::new_with_metrics(
            cache,
            &config.relay,
            metrics.clone(),
        ));

        Ok(Self {
            config,
            servers: Arc::new(servers),
            selector,
            metrics,
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validated TURN servers (empty when the registry is invalid)
    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    /// Get reference to the relay selector
    pub fn selector(&self) -> &RelaySelector {
        &self.selector
    }

    /// Get reference to the Prometheus metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the HTTP router with all routes and layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/v1/turn/best", get(turn::best))
        .route("/v1/turn/servers", get(turn::servers))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
