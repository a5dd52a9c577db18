//! Relay health evaluation
//!
//! Scrapes a relay's Prometheus endpoint, normalizes the exporter's metric
//! names, and turns the result into a load score. Every expected failure
//! (network, payload, data) is reported as [`EvaluationResult::Unhealthy`]
//! with a coded reason, never as an error.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::descriptor::ServerDescriptor;
use super::exposition;
use super::normalizer::{self, MetricCategory, Resolution};
use super::traffic::{TrafficSource, TrafficTracker};
use crate::config::HealthConfig;
use crate::error::{AppError, AppResult};

/// Bytes per megabyte used by the traffic term of the score
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const ALLOCATION_WEIGHT: f64 = 5.0;
const CONNECTION_WEIGHT: f64 = 1.0;
const TRAFFIC_MB_WEIGHT: f64 = 2.0;
const ERROR_WEIGHT: f64 = 10.0;

/// Canonical metric values for one evaluation, all clamped to >= 0
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub active_allocations: f64,
    pub connections_total: f64,
    pub traffic_bytes_current: f64,
    pub traffic_bytes_last_window: f64,
    pub traffic_source: TrafficSource,
    pub errors_total: f64,
}

/// Outcome of evaluating one relay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationResult {
    Healthy {
        name: String,
        host: String,
        metrics: MetricSnapshot,
        score: f64,
    },
    Unhealthy {
        name: String,
        host: String,
        reason: String,
    },
}

impl EvaluationResult {
    /// Build an unhealthy result for a server
    pub fn unhealthy(server: &ServerDescriptor, reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            name: server.name().to_string(),
            host: server.host().to_string(),
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Healthy { name, .. } | Self::Unhealthy { name, .. } => name,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Healthy { host, .. } | Self::Unhealthy { host, .. } => host,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }

    /// Score of a healthy result, `None` when unhealthy
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Healthy { score, .. } => Some(*score),
            Self::Unhealthy { .. } => None,
        }
    }

    /// Reason code of an unhealthy result, `None` when healthy
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Healthy { .. } => None,
            Self::Unhealthy { reason, .. } => Some(reason),
        }
    }
}

/// Evaluation seam used by the cache coordinator
///
/// Implementations must report expected failures as `Unhealthy` values.
#[async_trait]
pub trait Evaluate: Send + Sync {
    async fn evaluate(&self, server: &ServerDescriptor) -> EvaluationResult;
}

/// Composite load score, lower is better
///
/// Errors weigh 10, active allocations 5, relayed megabytes in the last
/// window 2, raw connections 1.
pub fn compute_score(metrics: &MetricSnapshot) -> f64 {
    metrics.active_allocations * ALLOCATION_WEIGHT
        + metrics.connections_total * CONNECTION_WEIGHT
        + (metrics.traffic_bytes_last_window / BYTES_PER_MB) * TRAFFIC_MB_WEIGHT
        + metrics.errors_total * ERROR_WEIGHT
}

fn clamped(resolution: &Resolution) -> f64 {
    if resolution.found {
        resolution.value.max(0.0)
    } else {
        0.0
    }
}

/// HTTP-scraping evaluator with per-host traffic history
pub struct HealthEvaluator {
    client: reqwest::Client,
    metrics_port: u16,
    max_body_bytes: usize,
    traffic: TrafficTracker,
}

impl HealthEvaluator {
    /// Create an evaluator from health settings
    ///
    /// # Errors
    ///
    /// Returns `AppError::HttpClient` if the HTTP client cannot be built.
    pub fn new(config: &HealthConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            metrics_port: config.metrics_port,
            max_body_bytes: config.max_body_bytes,
            traffic: TrafficTracker::new(),
        })
    }

    /// Metrics URL for a server, IPv6 hosts bracketed
    pub fn metrics_url(&self, server: &ServerDescriptor) -> String {
        format!(
            "http://{}:{}/metrics",
            server.url_host(),
            self.metrics_port
        )
    }

    /// Fetch the raw exposition body, mapping failures to reason codes
    async fn fetch(&self, url: &str) -> Result<String, String> {
        let mut response = match self
            .client
            .get(url)
            .header(ACCEPT, "text/plain")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err("timeout".to_string()),
            Err(e) => return Err(format!("metrics_fetch_failed:{}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(format!("http_{}", status.as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err("metrics_payload_too_large".to_string());
        }

        let mut body: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > self.max_body_bytes {
                        return Err("metrics_payload_too_large".to_string());
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => return Err("timeout".to_string()),
                Err(e) => return Err(format!("metrics_fetch_failed:{}", e)),
            }
        }

        let text = String::from_utf8_lossy(&body).into_owned();
        if text.trim().is_empty() {
            return Err("empty_metrics".to_string());
        }
        Ok(text)
    }

    /// Score an already-fetched exposition body
    ///
    /// Updates the server's traffic history as a side effect.
    pub fn assess(&self, server: &ServerDescriptor, body: &str, now: Instant) -> EvaluationResult {
        let parsed = exposition::parse(body);
        if parsed.is_empty() {
            return EvaluationResult::unhealthy(server, "no_parseable_metrics");
        }

        let allocations = normalizer::resolve(&parsed, MetricCategory::ActiveAllocations);
        let connections = normalizer::resolve(&parsed, MetricCategory::ConnectionsTotal);
        let sent = normalizer::resolve(&parsed, MetricCategory::TrafficSentBytes);
        let recv = normalizer::resolve(&parsed, MetricCategory::TrafficRecvBytes);
        let total = normalizer::resolve(&parsed, MetricCategory::TrafficTotalBytes);
        let errors = normalizer::resolve(&parsed, MetricCategory::ErrorsTotal);

        let meaningful = [&allocations, &connections, &sent, &recv, &total, &errors]
            .iter()
            .any(|r| r.found);
        if !meaningful {
            return EvaluationResult::unhealthy(server, "no_meaningful_metrics");
        }

        let traffic_current = if sent.found && recv.found {
            Some(clamped(&sent) + clamped(&recv))
        } else if total.found {
            Some(clamped(&total))
        } else {
            None
        };

        let (traffic_bytes_current, traffic_bytes_last_window, traffic_source) =
            match traffic_current {
                Some(current) => {
                    let window = self.traffic.observe(server.host(), current, now);
                    (current, window.window_bytes, window.source)
                }
                None => (0.0, 0.0, TrafficSource::None),
            };

        let metrics = MetricSnapshot {
            active_allocations: clamped(&allocations),
            connections_total: clamped(&connections),
            traffic_bytes_current,
            traffic_bytes_last_window,
            traffic_source,
            errors_total: clamped(&errors),
        };
        let score = compute_score(&metrics);

        EvaluationResult::Healthy {
            name: server.name().to_string(),
            host: server.host().to_string(),
            metrics,
            score,
        }
    }
}

#[async_trait]
impl Evaluate for HealthEvaluator {
    async fn evaluate(&self, server: &ServerDescriptor) -> EvaluationResult {
        let url = self.metrics_url(server);

        let result = match self.fetch(&url).await {
            Ok(body) => self.assess(server, &body, Instant::now()),
            Err(reason) => EvaluationResult::unhealthy(server, reason),
        };

        match &result {
            EvaluationResult::Healthy { score, metrics, .. } => {
                tracing::debug!(
                    server_name = %server.name(),
                    host = %server.host(),
                    score = *score,
                    traffic_source = metrics.traffic_source.as_str(),
                    "Relay evaluated healthy"
                );
            }
            EvaluationResult::Unhealthy { reason, .. } => {
                tracing::warn!(
                    server_name = %server.name(),
                    host = %server.host(),
                    url = %url,
                    reason = %reason,
                    "Relay evaluated unhealthy"
                );
            }
        }

        result
    }
}
