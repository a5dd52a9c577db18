//! Command-line interface for turnselect
//!
//! Provides argument parsing and subcommand handling for the turnselect binary.

use clap::{Parser, Subcommand};

/// Health-scored TURN relay selector
#[derive(Parser)]
#[command(name = "turnselect")]
#[command(version)]
#[command(about = "Health-scored TURN relay selector")]
#[command(
    long_about = "turnselect scrapes the Prometheus exporter of every configured TURN relay, \
    scores each one by load and error rate, and serves the least-loaded healthy relay \
    as ready-to-use ICE URLs."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate the TURN server registry and print the parsed servers
    Check,
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# turnselect Configuration
# ========================

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# ─────────────────────────────────────────────────────────────────────────────
# TURN SERVER REGISTRY
# ─────────────────────────────────────────────────────────────────────────────
#
# Either a JSON array of {name, host} objects or comma-separated name=host pairs.
# Names: [A-Za-z0-9_.-], 1-64 chars. Hosts: IPv4, IPv6 or DNS name (no scheme,
# port, path or credentials). One invalid entry disables the whole registry.
#
# The TURN_SERVERS environment variable overrides this value.

[registry]
servers = "east=turn1.example.com,west=turn2.example.com"
# servers = '[{"name": "east", "host": "turn1.example.com"}, {"name": "v6", "host": "2001:db8::1"}]'

# ─────────────────────────────────────────────────────────────────────────────
# HEALTH SCORING
# ─────────────────────────────────────────────────────────────────────────────

[health]
# Port of each relay's Prometheus exporter (coturn default)
metrics_port = 9641

# Hard timeout for one metrics scrape, in milliseconds
timeout_ms = 1500

# Metrics bodies larger than this are rejected
max_body_bytes = 1048576

# How long a relay evaluation is reused before the relay is scraped again
cache_ttl_ms = 3000

# ─────────────────────────────────────────────────────────────────────────────
# ADVERTISED RELAY PORTS
# ─────────────────────────────────────────────────────────────────────────────

[relay]
turn_port = 3478
turns_port = 5349

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"
"#
}
