//! Vendor metric-name normalization
//!
//! Different TURN exporters (coturn, eturnal, generic `turn_*` exporters) name
//! the same quantity differently. Each canonical [`MetricCategory`] carries an
//! ordered list of exact aliases and a list of fallback regex patterns.
//!
//! Resolution for one category:
//! 1. The first exact alias present in the map wins outright.
//! 2. Only if no alias is present, every metric matching any pattern is summed.
//!
//! The two strategies are never combined for the same category.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::exposition::MetricMap;

/// Canonical, exporter-agnostic metric category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricCategory {
    ActiveAllocations,
    ConnectionsTotal,
    TrafficSentBytes,
    TrafficRecvBytes,
    TrafficTotalBytes,
    ErrorsTotal,
}

impl MetricCategory {
    /// All categories, in evaluation order
    pub const ALL: [MetricCategory; 6] = [
        MetricCategory::ActiveAllocations,
        MetricCategory::ConnectionsTotal,
        MetricCategory::TrafficSentBytes,
        MetricCategory::TrafficRecvBytes,
        MetricCategory::TrafficTotalBytes,
        MetricCategory::ErrorsTotal,
    ];

    /// Stable label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::ActiveAllocations => "activeAllocations",
            MetricCategory::ConnectionsTotal => "connectionsTotal",
            MetricCategory::TrafficSentBytes => "trafficSentBytes",
            MetricCategory::TrafficRecvBytes => "trafficRecvBytes",
            MetricCategory::TrafficTotalBytes => "trafficTotalBytes",
            MetricCategory::ErrorsTotal => "errorsTotal",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            MetricCategory::ActiveAllocations => &[
                "turn_active_allocations",
                "turn_total_allocations",
                "coturn_active_allocations",
                "turnserver_active_allocations",
                "eturnal_allocations_active",
            ],
            MetricCategory::ConnectionsTotal => &[
                "turn_connections_total",
                "turn_total_connections",
                "coturn_connections_total",
                "turnserver_connections_total",
                "turn_sessions_total",
            ],
            MetricCategory::TrafficSentBytes => &[
                "turn_traffic_sent_bytes_total",
                "turn_total_traffic_sentb",
                "turn_traffic_sentb",
                "coturn_traffic_sent_bytes_total",
                "turnserver_sent_bytes_total",
            ],
            MetricCategory::TrafficRecvBytes => &[
                "turn_traffic_received_bytes_total",
                "turn_total_traffic_rcvb",
                "turn_traffic_rcvb",
                "coturn_traffic_received_bytes_total",
                "turnserver_received_bytes_total",
            ],
            MetricCategory::TrafficTotalBytes => &[
                "turn_traffic_bytes_total",
                "turn_total_traffic_bytes",
                "coturn_traffic_bytes_total",
                "turnserver_traffic_bytes_total",
            ],
            MetricCategory::ErrorsTotal => &[
                "turn_errors_total",
                "turn_total_errors",
                "coturn_errors_total",
                "turnserver_errors_total",
                "turn_allocation_errors_total",
            ],
        }
    }

    fn patterns(&self) -> &'static [Regex] {
        match self {
            MetricCategory::ActiveAllocations => &PATTERNS.active_allocations,
            MetricCategory::ConnectionsTotal => &PATTERNS.connections_total,
            MetricCategory::TrafficSentBytes => &PATTERNS.traffic_sent,
            MetricCategory::TrafficRecvBytes => &PATTERNS.traffic_recv,
            MetricCategory::TrafficTotalBytes => &PATTERNS.traffic_total,
            MetricCategory::ErrorsTotal => &PATTERNS.errors_total,
        }
    }
}

/// How a category value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedVia {
    Exact,
    Pattern,
}

/// Result of resolving one category against a metric map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub found: bool,
    pub value: f64,
    pub matched_via: MatchedVia,
}

struct CategoryPatterns {
    active_allocations: Vec<Regex>,
    connections_total: Vec<Regex>,
    traffic_sent: Vec<Regex>,
    traffic_recv: Vec<Regex>,
    traffic_total: Vec<Regex>,
    errors_total: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("normalizer pattern is a valid regex"))
        .collect()
}

static PATTERNS: LazyLock<CategoryPatterns> = LazyLock::new(|| CategoryPatterns {
    active_allocations: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_.*allocations?(_active|_current)?$",
        r"(?i)_active_allocations?$",
    ]),
    connections_total: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_.*(connections|sessions)(_total)?$",
    ]),
    traffic_sent: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_.*(sent|tx|out)_?b(ytes)?(_total)?$",
    ]),
    traffic_recv: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_.*(received|recv|rcv|rx|in)_?b(ytes)?(_total)?$",
    ]),
    traffic_total: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_(total_)?traffic_bytes(_total)?$",
        r"(?i)_relayed_bytes(_total)?$",
    ]),
    errors_total: compile(&[
        r"(?i)^(coturn|turn|turnserver|eturnal)_.*(errors?|failures?)(_total)?$",
    ]),
});

/// Resolve one canonical category against a parsed metric map
pub fn resolve(metrics: &MetricMap, category: MetricCategory) -> Resolution {
    for alias in category.aliases() {
        if let Some(value) = metrics.get(*alias) {
            return Resolution {
                found: true,
                value: *value,
                matched_via: MatchedVia::Exact,
            };
        }
    }

    let patterns = category.patterns();
    let mut found = false;
    let mut value = 0.0;
    for (name, sample) in metrics {
        if patterns.iter().any(|p| p.is_match(name)) {
            found = true;
            value += sample;
        }
    }

    Resolution {
        found,
        value,
        matched_via: MatchedVia::Pattern,
    }
}
