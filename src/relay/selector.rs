//! Best-relay selection
//!
//! Evaluates every candidate concurrently through the [`HealthCache`], keeps
//! the healthy ones, and returns the lowest score. Equal scores are broken by
//! name so identical fleets always produce the same winner.

use serde::Serialize;
use std::sync::Arc;

use super::cache::HealthCache;
use super::descriptor::{ServerDescriptor, bracket_host};
use super::health::{EvaluationResult, MetricSnapshot};
use crate::config::RelayConfig;
use crate::metrics::{Metrics, SelectionOutcome};

/// Winning relay plus ready-to-use ICE URLs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    pub name: String,
    pub host: String,
    pub turn_url_udp: String,
    pub turn_url_tcp: String,
    pub turns_url_tls: String,
    pub metrics: MetricSnapshot,
    pub score: f64,
}

/// Selects the least-loaded healthy relay
pub struct RelaySelector {
    cache: Arc<HealthCache>,
    turn_port: u16,
    turns_port: u16,
    metrics: Option<Arc<Metrics>>,
}

impl RelaySelector {
    /// Create a selector on top of a shared evaluation cache
    pub fn new(cache: Arc<HealthCache>, relay: &RelayConfig) -> Self {
        Self {
            cache,
            turn_port: relay.turn_port,
            turns_port: relay.turns_port,
            metrics: None,
        }
    }

    /// Create a selector that records selection outcomes in Prometheus
    pub fn new_with_metrics(
        cache: Arc<HealthCache>,
        relay: &RelayConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(cache, relay)
        }
    }

    /// Evaluate every server concurrently, in input order
    pub async fn evaluate_all(&self, servers: &[ServerDescriptor]) -> Vec<EvaluationResult> {
        futures::future::join_all(
            servers
                .iter()
                .map(|server| self.cache.get_or_evaluate(server)),
        )
        .await
    }

    /// Pick the best relay, or `None` when no configured server is healthy
    pub async fn select_best(&self, servers: &[ServerDescriptor]) -> Option<SelectionResult> {
        if servers.is_empty() {
            tracing::warn!("No TURN servers configured, nothing to select");
            self.record(SelectionOutcome::NoServer);
            return None;
        }

        let results = self.evaluate_all(servers).await;

        let mut healthy: Vec<(String, String, MetricSnapshot, f64)> = results
            .into_iter()
            .filter_map(|result| match result {
                EvaluationResult::Healthy {
                    name,
                    host,
                    metrics,
                    score,
                } => Some((name, host, metrics, score)),
                EvaluationResult::Unhealthy { .. } => None,
            })
            .collect();

        if healthy.is_empty() {
            tracing::error!(
                total_servers = servers.len(),
                "No healthy TURN server available - all candidates unhealthy"
            );
            self.record(SelectionOutcome::NoServer);
            return None;
        }

        healthy.sort_by(|a, b| a.3.total_cmp(&b.3).then_with(|| a.0.cmp(&b.0)));

        let healthy_count = healthy.len();
        let (name, host, metrics, score) = healthy.swap_remove(0);
        let url_host = bracket_host(&host);

        let selection = SelectionResult {
            turn_url_udp: format!("turn:{}:{}?transport=udp", url_host, self.turn_port),
            turn_url_tcp: format!("turn:{}:{}?transport=tcp", url_host, self.turn_port),
            turns_url_tls: format!("turns:{}:{}?transport=tcp", url_host, self.turns_port),
            score: round_score(score),
            name,
            host,
            metrics,
        };

        tracing::info!(
            server_name = %selection.name,
            host = %selection.host,
            score = selection.score,
            healthy_servers = healthy_count,
            total_servers = servers.len(),
            "Selected TURN server"
        );
        self.record(SelectionOutcome::Selected);

        Some(selection)
    }

    fn record(&self, outcome: SelectionOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_selection(outcome);
        }
    }
}

/// Round to two decimal places for presentation
fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::health::Evaluate;
    use crate::relay::traffic::TrafficSource;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Returns a fixed score per host, unhealthy for unknown hosts
    struct ScriptedEvaluator {
        scores: HashMap<String, f64>,
    }

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            active_allocations: 1.0,
            connections_total: 2.0,
            traffic_bytes_current: 0.0,
            traffic_bytes_last_window: 0.0,
            traffic_source: TrafficSource::None,
            errors_total: 0.0,
        }
    }

    #[async_trait]
    impl Evaluate for ScriptedEvaluator {
        async fn evaluate(&self, server: &ServerDescriptor) -> EvaluationResult {
            match self.scores.get(server.host()) {
                Some(score) => EvaluationResult::Healthy {
                    name: server.name().to_string(),
                    host: server.host().to_string(),
                    metrics: snapshot(),
                    score: *score,
                },
                None => EvaluationResult::unhealthy(server, "timeout"),
            }
        }
    }

    fn selector(scores: &[(&str, f64)]) -> RelaySelector {
        let evaluator = ScriptedEvaluator {
            scores: scores.iter().map(|(h, s)| (h.to_string(), *s)).collect(),
        };
        let cache = Arc::new(HealthCache::new(Arc::new(evaluator), Duration::from_secs(3)));
        RelaySelector::new(cache, &RelayConfig::default())
    }

    #[tokio::test]
    async fn test_empty_server_list_returns_none() {
        let selector = selector(&[]);
        assert!(selector.select_best(&[]).await.is_none());
    }

    #[tokio::test]
    async fn test_lowest_score_wins() {
        let selector = selector(&[("turn1.example.com", 12.5), ("turn2.example.com", 8.0)]);
        let servers = vec![
            ServerDescriptor::new("east", "turn1.example.com"),
            ServerDescriptor::new("west", "turn2.example.com"),
        ];
        let best = selector.select_best(&servers).await.expect("should select");
        assert_eq!(best.name, "west");
        assert_eq!(best.turn_url_udp, "turn:turn2.example.com:3478?transport=udp");
        assert_eq!(best.turn_url_tcp, "turn:turn2.example.com:3478?transport=tcp");
        assert_eq!(best.turns_url_tls, "turns:turn2.example.com:5349?transport=tcp");
    }

    #[tokio::test]
    async fn test_tie_broken_by_name() {
        let selector = selector(&[("h-beta", 3.0), ("h-alpha", 3.0)]);
        let servers = vec![
            ServerDescriptor::new("beta", "h-beta"),
            ServerDescriptor::new("alpha", "h-alpha"),
        ];
        let best = selector.select_best(&servers).await.expect("should select");
        assert_eq!(best.name, "alpha");
    }

    #[tokio::test]
    async fn test_unhealthy_servers_are_skipped() {
        let selector = selector(&[("h2", 100.0)]);
        let servers = vec![
            ServerDescriptor::new("a", "h1"),
            ServerDescriptor::new("b", "h2"),
        ];
        let best = selector.select_best(&servers).await.expect("should select");
        assert_eq!(best.name, "b");
    }

    #[tokio::test]
    async fn test_all_unhealthy_returns_none() {
        let selector = selector(&[]);
        let servers = vec![
            ServerDescriptor::new("a", "h1"),
            ServerDescriptor::new("b", "h2"),
        ];
        assert!(selector.select_best(&servers).await.is_none());
    }

    #[tokio::test]
    async fn test_ipv6_winner_urls_are_bracketed_and_score_rounded() {
        let selector = selector(&[("2001:db8::5", 1.23456)]);
        let servers = vec![ServerDescriptor::new("v6", "2001:db8::5")];
        let best = selector.select_best(&servers).await.expect("should select");
        assert_eq!(best.host, "2001:db8::5");
        assert_eq!(best.turn_url_udp, "turn:[2001:db8::5]:3478?transport=udp");
        assert_eq!(best.turns_url_tls, "turns:[2001:db8::5]:5349?transport=tcp");
        assert_eq!(best.score, 1.23);
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(8.0), 8.0);
        assert_eq!(round_score(12.499), 12.5);
        assert_eq!(round_score(0.004), 0.0);
    }
}
