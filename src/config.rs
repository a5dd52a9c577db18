//! Configuration management for turnselect
//!
//! Parses TOML configuration files and provides typed access to settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::registry::{self, RegistryError};
use crate::relay::ServerDescriptor;

/// Environment variable that overrides `registry.servers`
pub const REGISTRY_ENV: &str = "TURN_SERVERS";

/// Upper bound for the metrics scrape timeout
const MAX_TIMEOUT_MS: u64 = 30_000;

/// Upper bound for the evaluation cache TTL
const MAX_CACHE_TTL_MS: u64 = 600_000;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Candidate TURN servers
///
/// `servers` is the raw registry string (JSON array or `name=host` CSV). It is
/// validated separately so a bad registry degrades to "no server" instead of
/// refusing to start.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub servers: String,
}

/// Relay metrics scraping and caching settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Port of each relay's Prometheus exporter
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Hard timeout for one metrics scrape
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest accepted metrics body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// How long an evaluation stays fresh
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

impl HealthConfig {
    /// Evaluation cache TTL as a Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            timeout_ms: default_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9641
}

fn default_timeout_ms() -> u64 {
    1500
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_cache_ttl_ms() -> u64 {
    3000
}

/// Ports advertised in the generated TURN URLs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default = "default_turn_port")]
    pub turn_port: u16,
    #[serde(default = "default_turns_port")]
    pub turns_port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            turn_port: default_turn_port(),
            turns_port: default_turns_port(),
        }
    }
}

fn default_turn_port() -> u16 {
    3478
}

fn default_turns_port() -> u16 {
    5349
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// `TURN_SERVERS`, when set, replaces `registry.servers`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config.with_registry_override(std::env::var(REGISTRY_ENV).ok()))
    }

    /// Replace the registry string when an override is present
    pub fn with_registry_override(mut self, servers: Option<String>) -> Self {
        if let Some(servers) = servers {
            tracing::debug!(
                env = REGISTRY_ENV,
                "Using TURN server registry from environment"
            );
            self.registry.servers = servers;
        }
        self
    }

    /// Parse and validate the configured TURN server registry
    pub fn servers(&self) -> Result<Vec<ServerDescriptor>, RegistryError> {
        registry::parse(&self.registry.servers)
    }

    /// Validate configuration after parsing
    ///
    /// The registry string is not checked here; see [`Config::servers`].
    pub fn validate(&self) -> AppResult<()> {
        let health = &self.health;

        if health.metrics_port == 0 {
            return Err(AppError::Config(
                "health.metrics_port must be greater than 0".to_string(),
            ));
        }

        if health.timeout_ms == 0 || health.timeout_ms > MAX_TIMEOUT_MS {
            return Err(AppError::Config(format!(
                "health.timeout_ms must be in (0, {}], got {}",
                MAX_TIMEOUT_MS, health.timeout_ms
            )));
        }

        if health.max_body_bytes == 0 {
            return Err(AppError::Config(
                "health.max_body_bytes must be greater than 0".to_string(),
            ));
        }

        if health.cache_ttl_ms == 0 || health.cache_ttl_ms > MAX_CACHE_TTL_MS {
            return Err(AppError::Config(format!(
                "health.cache_ttl_ms must be in (0, {}], got {}",
                MAX_CACHE_TTL_MS, health.cache_ttl_ms
            )));
        }

        if self.relay.turn_port == 0 || self.relay.turns_port == 0 {
            return Err(AppError::Config(
                "relay.turn_port and relay.turns_port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
host = "127.0.0.1"
port = 3000
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_str(MINIMAL).expect("should parse");
        assert_eq!(config.health.metrics_port, 9641);
        assert_eq!(config.health.timeout_ms, 1500);
        assert_eq!(config.health.max_body_bytes, 1024 * 1024);
        assert_eq!(config.health.cache_ttl(), Duration::from_millis(3000));
        assert_eq!(config.relay.turn_port, 3478);
        assert_eq!(config.relay.turns_port, 5349);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.registry.servers.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_str(
            r#"
[server]
host = "0.0.0.0"
port = 8080

[registry]
servers = "east=turn1.example.com,west=turn2.example.com"

[health]
metrics_port = 9100
timeout_ms = 800
max_body_bytes = 4096
cache_ttl_ms = 5000

[relay]
turn_port = 3479
turns_port = 443

[observability]
log_level = "debug"
"#,
        )
        .expect("should parse");

        assert_eq!(config.health.metrics_port, 9100);
        assert_eq!(config.relay.turns_port, 443);
        let servers = config.servers().expect("registry should be valid");
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].name(), "west");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_str(&format!("{}\n[health]\ntimeout_ms = 0\n", MINIMAL))
            .unwrap_err();
        assert!(err.to_string().contains("health.timeout_ms"));
    }

    #[test]
    fn test_excessive_ttl_rejected() {
        let err = Config::from_str(&format!("{}\n[health]\ncache_ttl_ms = 600001\n", MINIMAL))
            .unwrap_err();
        assert!(err.to_string().contains("health.cache_ttl_ms"));
    }

    #[test]
    fn test_zero_relay_port_rejected() {
        assert!(Config::from_str(&format!("{}\n[relay]\nturn_port = 0\n", MINIMAL)).is_err());
    }

    #[test]
    fn test_invalid_registry_does_not_fail_config_parse() {
        let config = Config::from_str(&format!(
            "{}\n[registry]\nservers = \"not a registry\"\n",
            MINIMAL
        ))
        .expect("registry is validated separately");
        assert!(config.servers().is_err());
    }

    #[test]
    fn test_registry_override() {
        let config = Config::from_str(MINIMAL)
            .unwrap()
            .with_registry_override(Some("a=turn.example.com".to_string()));
        assert_eq!(config.servers().unwrap()[0].name(), "a");

        let untouched = Config::from_str(MINIMAL).unwrap().with_registry_override(None);
        assert!(untouched.registry.servers.is_empty());
    }
}
