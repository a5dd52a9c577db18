//! Per-host traffic delta tracking
//!
//! Relays export absolute byte counters. The tracker keeps one rolling
//! observation per host and turns each new absolute value into the number of
//! bytes moved since the previous poll. A counter that goes backwards (relay
//! restart) becomes a fresh baseline, never a negative delta.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

/// Where `traffic_bytes_last_window` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSource {
    /// Difference against the previous poll
    Delta,
    /// First poll, or counter reset: the absolute value is used
    AbsoluteFallback,
    /// No traffic metric was exported
    None,
}

impl TrafficSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficSource::Delta => "delta",
            TrafficSource::AbsoluteFallback => "absolute_fallback",
            TrafficSource::None => "none",
        }
    }
}

/// Rate estimate for one poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficWindow {
    pub window_bytes: f64,
    pub source: TrafficSource,
}

#[derive(Debug, Clone, Copy)]
struct TrafficHistoryEntry {
    bytes_at_last_poll: f64,
    polled_at: Instant,
}

/// Rolling last-observation store, one entry per host
#[derive(Debug, Default)]
pub struct TrafficTracker {
    history: Mutex<HashMap<String, TrafficHistoryEntry>>,
}

impl TrafficTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` absolute bytes for `host` and return the window estimate
    pub fn observe(&self, host: &str, current: f64, now: Instant) -> TrafficWindow {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);

        let window = match history.get(host) {
            Some(previous) if current >= previous.bytes_at_last_poll => TrafficWindow {
                window_bytes: current - previous.bytes_at_last_poll,
                source: TrafficSource::Delta,
            },
            Some(previous) => {
                tracing::debug!(
                    host = %host,
                    previous_bytes = previous.bytes_at_last_poll,
                    current_bytes = current,
                    "Traffic counter went backwards, treating as fresh baseline"
                );
                TrafficWindow {
                    window_bytes: current,
                    source: TrafficSource::AbsoluteFallback,
                }
            }
            None => TrafficWindow {
                window_bytes: current,
                source: TrafficSource::AbsoluteFallback,
            },
        };

        history.insert(
            host.to_string(),
            TrafficHistoryEntry {
                bytes_at_last_poll: current,
                polled_at: now,
            },
        );

        window
    }

    /// Last recorded absolute value for a host and when it was polled
    #[cfg(test)]
    pub fn last_observed(&self, host: &str) -> Option<(f64, Instant)> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .get(host)
            .map(|entry| (entry.bytes_at_last_poll, entry.polled_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_sequence_with_counter_reset() {
        let tracker = TrafficTracker::new();
        let now = Instant::now();

        let first = tracker.observe("h", 1000.0 + 500.0, now);
        assert_eq!(first.window_bytes, 1500.0);
        assert_eq!(first.source, TrafficSource::AbsoluteFallback);

        let second = tracker.observe("h", 1200.0 + 600.0, now);
        assert_eq!(second.window_bytes, 300.0);
        assert_eq!(second.source, TrafficSource::Delta);

        let third = tracker.observe("h", 100.0, now);
        assert_eq!(third.window_bytes, 100.0);
        assert_eq!(third.source, TrafficSource::AbsoluteFallback);

        // Next poll deltas against the reset baseline
        let fourth = tracker.observe("h", 160.0, now);
        assert_eq!(fourth.window_bytes, 60.0);
        assert_eq!(fourth.source, TrafficSource::Delta);
    }

    #[test]
    fn test_unchanged_counter_is_zero_delta() {
        let tracker = TrafficTracker::new();
        let now = Instant::now();
        tracker.observe("h", 42.0, now);
        let window = tracker.observe("h", 42.0, now);
        assert_eq!(window.window_bytes, 0.0);
        assert_eq!(window.source, TrafficSource::Delta);
    }

    #[test]
    fn test_hosts_are_tracked_independently() {
        let tracker = TrafficTracker::new();
        let now = Instant::now();
        tracker.observe("a", 1000.0, now);
        let b = tracker.observe("b", 10.0, now);
        assert_eq!(b.source, TrafficSource::AbsoluteFallback);
        assert_eq!(tracker.last_observed("a"), Some((1000.0, now)));
        assert_eq!(tracker.last_observed("b"), Some((10.0, now)));
        assert_eq!(tracker.last_observed("c"), None);
    }
}
