//! Prometheus metrics collection for turnselect
//!
//! This module provides metrics instrumentation for tracking:
//! - Selection outcomes (a winner vs. no healthy server)
//! - Relay evaluation outcomes and latency
//! - Evaluation cache effectiveness (hits, coalesced joins, misses)
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::relay::EvaluationResult;

/// Result of one evaluation cache lookup, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// Fresh cached value returned without network activity
    Hit,
    /// Caller joined an evaluation already in flight
    Joined,
    /// New evaluation started
    Miss,
}

impl CacheLookup {
    /// Convert lookup result to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Joined => "joined",
            CacheLookup::Miss => "miss",
        }
    }
}

/// Selection outcome, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected,
    NoServer,
}

impl SelectionOutcome {
    /// Convert outcome to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionOutcome::Selected => "selected",
            SelectionOutcome::NoServer => "no_server",
        }
    }
}

/// Metrics collector for turnselect
///
/// Owns its own registry so tests can create isolated instances.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    selections_total: IntCounterVec,
    evaluations_total: IntCounterVec,
    cache_lookups_total: IntCounterVec,
    evaluation_duration: HistogramVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 outcomes
        let selections_total = IntCounterVec::new(
            Opts::new(
                "turnselect_selections_total",
                "Total number of best-server selections by outcome",
            ),
            &["outcome"],
        )?;

        // Cardinality: 2 outcomes. Reasons stay in logs to keep this bounded.
        let evaluations_total = IntCounterVec::new(
            Opts::new(
                "turnselect_evaluations_total",
                "Total number of relay health evaluations by outcome",
            ),
            &["outcome"],
        )?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new(
                "turnselect_cache_lookups_total",
                "Evaluation cache lookups by result (hit, joined, miss)",
            ),
            &["result"],
        )?;

        let evaluation_duration = HistogramVec::new(
            HistogramOpts::new(
                "turnselect_evaluation_duration_ms",
                "Relay health evaluation latency in milliseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 1500.0]),
            &["outcome"],
        )?;

        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(evaluations_total.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(evaluation_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            selections_total,
            evaluations_total,
            cache_lookups_total,
            evaluation_duration,
        })
    }

    /// Record the outcome of one selection
    pub fn record_selection(&self, outcome: SelectionOutcome) {
        self.selections_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record a finished relay evaluation and its latency
    pub fn record_evaluation(&self, result: &EvaluationResult, elapsed: Duration) {
        let outcome = if result.is_healthy() {
            "healthy"
        } else {
            "unhealthy"
        };
        self.evaluations_total.with_label_values(&[outcome]).inc();
        self.evaluation_duration
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Record one evaluation cache lookup
    pub fn record_cache_lookup(&self, lookup: CacheLookup) {
        self.cache_lookups_total
            .with_label_values(&[lookup.as_str()])
            .inc();
    }

    /// Count of selections with the given outcome
    pub fn selections_count(&self, outcome: SelectionOutcome) -> u64 {
        self.selections_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Count of cache lookups with the given result
    #[cfg(test)]
    pub fn cache_lookups_count(&self, lookup: CacheLookup) -> u64 {
        self.cache_lookups_total
            .with_label_values(&[lookup.as_str()])
            .get()
    }

    /// Encode all metrics in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not valid UTF-8.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_families.len(),
                "Prometheus text encoder failed"
            );
            e
        })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Metrics output is not valid UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ServerDescriptor;

    #[test]
    fn test_metrics_new_registers_all_families() {
        let metrics = Metrics::new().expect("should create metrics");
        metrics.record_selection(SelectionOutcome::Selected);
        metrics.record_cache_lookup(CacheLookup::Hit);
        metrics.record_evaluation(
            &EvaluationResult::unhealthy(&ServerDescriptor::new("a", "h"), "timeout"),
            Duration::from_millis(12),
        );

        let output = metrics.gather().expect("should gather");
        assert!(output.contains("turnselect_selections_total"));
        assert!(output.contains("turnselect_evaluations_total"));
        assert!(output.contains("turnselect_cache_lookups_total"));
        assert!(output.contains("turnselect_evaluation_duration_ms"));
    }

    #[test]
    fn test_counts_by_label() {
        let metrics = Metrics::new().expect("should create metrics");
        metrics.record_selection(SelectionOutcome::NoServer);
        metrics.record_selection(SelectionOutcome::NoServer);
        metrics.record_cache_lookup(CacheLookup::Joined);

        assert_eq!(metrics.selections_count(SelectionOutcome::NoServer), 2);
        assert_eq!(metrics.selections_count(SelectionOutcome::Selected), 0);
        assert_eq!(metrics.cache_lookups_count(CacheLookup::Joined), 1);
        assert_eq!(metrics.cache_lookups_count(CacheLookup::Miss), 0);
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = Metrics::new().expect("should create metrics");
        let b = Metrics::new().expect("should create metrics");
        a.record_selection(SelectionOutcome::Selected);
        assert_eq!(b.selections_count(SelectionOutcome::Selected), 0);
    }
}
