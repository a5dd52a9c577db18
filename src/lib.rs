//! turnselect - Health-scored TURN relay selector
//!
//! Given a static list of candidate TURN relays, scrapes each relay's
//! Prometheus exporter, scores it by load and error rate, and picks the
//! least-loaded healthy one for a new media session.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod relay;
pub mod telemetry;
