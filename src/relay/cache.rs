//! Per-host evaluation cache with request coalescing
//!
//! Each host moves through `Empty -> InFlight -> Cached(fresh) -> Cached(stale)`,
//! where a stale entry behaves like `Empty` on the next lookup. At most one
//! evaluation per host is outstanding at any time: concurrent callers that
//! arrive while one is running await the same shared future.
//!
//! The check-then-publish step runs under a single mutex, so the single-flight
//! invariant holds on a multi-threaded runtime.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::descriptor::ServerDescriptor;
use super::health::{EvaluationResult, Evaluate};
use crate::metrics::{CacheLookup, Metrics};

type InFlight = Shared<BoxFuture<'static, EvaluationResult>>;

#[derive(Default)]
struct CacheEntry {
    value: Option<EvaluationResult>,
    expires_at: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl CacheEntry {
    fn fresh_value(&self, now: Instant) -> Option<&EvaluationResult> {
        match (&self.value, self.expires_at) {
            (Some(value), Some(expires_at)) if expires_at > now => Some(value),
            _ => None,
        }
    }
}

/// Evaluation cache and single-flight coordinator, keyed by host
///
/// Owns the evaluator (and through it the per-host traffic history), so a
/// fresh `HealthCache` is a fully isolated instance.
pub struct HealthCache {
    evaluator: Arc<dyn Evaluate>,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl HealthCache {
    /// Create a cache in front of `evaluator` with the given freshness window
    pub fn new(evaluator: Arc<dyn Evaluate>, ttl: Duration) -> Self {
        Self {
            evaluator,
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            metrics: None,
        }
    }

    /// Create a cache that records lookups and evaluations in Prometheus
    pub fn new_with_metrics(
        evaluator: Arc<dyn Evaluate>,
        ttl: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(evaluator, ttl)
        }
    }

    /// Return the cached evaluation for `server`, joining or starting one as needed
    ///
    /// Never fails: a panicking evaluation is cached as
    /// `Unhealthy("evaluation_failed:<message>")`.
    pub async fn get_or_evaluate(&self, server: &ServerDescriptor) -> EvaluationResult {
        let shared = {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(server.host().to_string()).or_default();

            if let Some(value) = entry.fresh_value(Instant::now()) {
                tracing::debug!(host = %server.host(), "Evaluation cache hit");
                self.record_lookup(CacheLookup::Hit);
                return value.clone();
            }

            match entry.in_flight.clone() {
                Some(in_flight) => {
                    tracing::debug!(host = %server.host(), "Joining in-flight evaluation");
                    self.record_lookup(CacheLookup::Joined);
                    in_flight
                }
                None => {
                    self.record_lookup(CacheLookup::Miss);
                    let shared = self.spawn_evaluation(server.clone());
                    entry.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Current cached value for a host, fresh or stale, without evaluating
    #[cfg(test)]
    pub async fn peek(&self, host: &str) -> Option<EvaluationResult> {
        let entries = self.entries.lock().await;
        entries.get(host).and_then(|entry| entry.value.clone())
    }

    /// Whether an evaluation for `host` is currently outstanding
    #[cfg(test)]
    pub async fn is_in_flight(&self, host: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(host)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Start an evaluation on its own task and return a shareable handle
    ///
    /// Must be called with the entries lock held: the task stores its result
    /// under the same lock, so it cannot complete before `in_flight` is set.
    fn spawn_evaluation(&self, server: ServerDescriptor) -> InFlight {
        let evaluator = Arc::clone(&self.evaluator);
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        let metrics = self.metrics.clone();
        let fallback = server.clone();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = match AssertUnwindSafe(evaluator.evaluate(&server))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(
                        server_name = %server.name(),
                        host = %server.host(),
                        error = %message,
                        "Relay evaluation panicked; caching as unhealthy. This is a bug."
                    );
                    EvaluationResult::unhealthy(
                        &server,
                        format!("evaluation_failed:{}", message),
                    )
                }
            };

            if let Some(metrics) = &metrics {
                metrics.record_evaluation(&result, started.elapsed());
            }

            let mut entries = entries.lock().await;
            let entry = entries.entry(server.host().to_string()).or_default();
            entry.value = Some(result.clone());
            entry.expires_at = Some(Instant::now() + ttl);
            entry.in_flight = None;

            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                tracing::error!(
                    server_name = %fallback.name(),
                    host = %fallback.host(),
                    error = %e,
                    "Relay evaluation task did not complete"
                );
                EvaluationResult::unhealthy(&fallback, format!("evaluation_failed:{}", e))
            })
        }
        .boxed()
        .shared()
    }

    fn record_lookup(&self, lookup: CacheLookup) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(lookup);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
