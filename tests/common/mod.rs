//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use turnselect::config::HealthConfig;
use turnselect::relay::{HealthCache, HealthEvaluator, ServerDescriptor};
use wiremock::MockServer;

/// Health settings pointing the metrics scrape at a mock server's port
pub fn health_config_for(mock: &MockServer) -> HealthConfig {
    HealthConfig {
        metrics_port: mock.address().port(),
        timeout_ms: 300,
        ..HealthConfig::default()
    }
}

/// A descriptor that resolves to the mock server
pub fn loopback_server(name: &str) -> ServerDescriptor {
    ServerDescriptor::new(name, "127.0.0.1")
}

/// Cache over a real HTTP evaluator scraping the mock server
pub fn cache_for(mock: &MockServer) -> Arc<HealthCache> {
    let config = health_config_for(mock);
    let evaluator =
        Arc::new(HealthEvaluator::new(&config).expect("should build evaluator"));
    Arc::new(HealthCache::new(evaluator, config.cache_ttl()))
}

/// A typical coturn exporter body
pub const COTURN_BODY: &str = r#"
# HELP turn_total_allocations Number of active allocations
# TYPE turn_total_allocations gauge
turn_total_allocations{type="UDP"} 2
turn_total_allocations{type="TCP"} 1
# HELP turn_total_traffic_sentb Bytes sent
turn_total_traffic_sentb 1048576
turn_total_traffic_rcvb 1048576
process_resident_memory_bytes 12345678
"#;
