//! TURN server registry parsing
//!
//! The registry is a single configuration string in one of two forms:
//! - a JSON array: `[{"name": "east", "host": "turn1.example.com"}]`
//! - comma-separated pairs: `east=turn1.example.com,west=2001:db8::1`
//!
//! Validation is all-or-nothing: one malformed entry rejects the whole
//! registry. Duplicate `(name, host)` pairs (case-insensitive) collapse to the
//! first occurrence.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use thiserror::Error;

use crate::relay::ServerDescriptor;

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").expect("server name pattern is a valid regex")
});

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Registry validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("TURN server registry is empty")]
    Empty,

    #[error("TURN server registry is not a valid JSON array of {{name, host}} objects: {0}")]
    InvalidJson(String),

    #[error("Registry entry {index} is malformed: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("Registry entry {index} has invalid name '{name}'")]
    InvalidName { index: usize, name: String },

    #[error("Registry entry {index} has invalid host '{host}'")]
    InvalidHost { index: usize, host: String },

    #[error("Registry entry {index} reuses server name '{name}' for a different host")]
    DuplicateName { index: usize, name: String },
}

// Extra keys such as "region" are ignored
#[derive(Deserialize)]
struct RawEntry {
    name: String,
    host: String,
}

/// Parse and validate a registry string into server descriptors
///
/// # Errors
///
/// Returns the first validation failure; no partial list is ever produced.
pub fn parse(input: &str) -> Result<Vec<ServerDescriptor>, RegistryError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RegistryError::Empty);
    }

    let raw: Vec<(String, String)> = if input.starts_with('[') {
        serde_json::from_str::<Vec<RawEntry>>(input)
            .map_err(|e| RegistryError::InvalidJson(e.to_string()))?
            .into_iter()
            .map(|entry| (entry.name, entry.host))
            .collect()
    } else {
        input
            .split(',')
            .enumerate()
            .map(|(index, pair)| {
                pair.trim()
                    .split_once('=')
                    .map(|(name, host)| (name.to_string(), host.to_string()))
                    .ok_or_else(|| RegistryError::InvalidEntry {
                        index,
                        reason: format!("expected name=host, got '{}'", pair.trim()),
                    })
            })
            .collect::<Result<_, _>>()?
    };

    if raw.is_empty() {
        return Err(RegistryError::Empty);
    }

    let mut seen_pairs = HashSet::new();
    let mut names: Vec<(String, String)> = Vec::new();
    let mut servers = Vec::new();

    for (index, (name, host)) in raw.into_iter().enumerate() {
        let name = name.trim().to_string();
        if !NAME.is_match(&name) {
            return Err(RegistryError::InvalidName { index, name });
        }

        let host = normalize_host(host.trim()).ok_or_else(|| RegistryError::InvalidHost {
            index,
            host: host.trim().to_string(),
        })?;

        let name_key = name.to_ascii_lowercase();
        let host_key = host.to_ascii_lowercase();
        if !seen_pairs.insert((name_key.clone(), host_key.clone())) {
            tracing::debug!(server_name = %name, host = %host, "Dropping duplicate registry entry");
            continue;
        }
        if names.iter().any(|(n, h)| *n == name_key && *h != host_key) {
            return Err(RegistryError::DuplicateName { index, name });
        }
        names.push((name_key, host_key));

        servers.push(ServerDescriptor::new(name, host));
    }

    Ok(servers)
}

/// Validate a host and return its stored form (IPv6 without brackets)
fn normalize_host(host: &str) -> Option<String> {
    if host.is_empty()
        || host.contains("://")
        || host.contains(['/', '?', '#', '@'])
    {
        return None;
    }

    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'));
    if let Some(inner) = unbracketed {
        return inner.parse::<Ipv6Addr>().ok().map(|ip| ip.to_string());
    }

    if host.parse::<Ipv4Addr>().is_ok() {
        return Some(host.to_string());
    }
    if let Ok(ip) = host.parse::<Ipv6Addr>() {
        return Some(ip.to_string());
    }

    is_valid_hostname(host).then(|| host.to_string())
}

fn is_valid_hostname(host: &str) -> bool {
    if host.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_pairs() {
        let servers = parse("east=turn1.example.com, west=turn2.example.com").unwrap();
        assert_eq!(
            servers,
            vec![
                ServerDescriptor::new("east", "turn1.example.com"),
                ServerDescriptor::new("west", "turn2.example.com"),
            ]
        );
    }

    #[test]
    fn test_parse_json_array() {
        let servers =
            parse(r#"[{"name":"a","host":"10.0.0.1"},{"name":"b","host":"[2001:db8::1]"}]"#)
                .unwrap();
        assert_eq!(servers[0].host(), "10.0.0.1");
        assert_eq!(servers[1].host(), "2001:db8::1");
    }

    #[test]
    fn test_json_entries_may_carry_extra_keys() {
        let servers = parse(
            r#"[{"name":"east","host":"turn1.example.com","region":"us-east-1","weight":2}]"#,
        )
        .unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name(), "east");
        assert_eq!(servers[0].host(), "turn1.example.com");
    }

    #[test]
    fn test_parse_ipv6_in_csv() {
        let servers = parse("v6=2001:db8::1").unwrap();
        assert_eq!(servers[0].host(), "2001:db8::1");
    }

    #[test]
    fn test_duplicates_collapse_case_insensitively() {
        let servers = parse("east=Turn1.example.com,EAST=turn1.example.com").unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name(), "east");
        assert_eq!(servers[0].host(), "Turn1.example.com");
    }

    #[test]
    fn test_one_bad_entry_rejects_everything() {
        let err = parse("east=turn1.example.com,bad entry").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidEntry { index: 1, .. }));
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(matches!(
            parse("has space=turn.example.com"),
            Err(RegistryError::InvalidName { .. })
        ));
        let long = format!("{}=turn.example.com", "n".repeat(65));
        assert!(matches!(parse(&long), Err(RegistryError::InvalidName { .. })));
    }

    #[test]
    fn test_rejects_url_like_hosts() {
        for host in [
            "http://turn.example.com",
            "turn.example.com/metrics",
            "user@turn.example.com",
            "turn.example.com?x=1",
            "turn.example.com#frag",
            "turn.example.com:3478",
            "-turn.example.com",
            "turn-.example.com",
            "turn..example.com",
            "",
        ] {
            let input = format!("a={}", host);
            assert!(
                matches!(parse(&input), Err(RegistryError::InvalidHost { .. })),
                "host '{}' should be rejected",
                host
            );
        }
    }

    #[test]
    fn test_rejects_overlong_labels_and_hostnames() {
        let label = "a".repeat(64);
        assert!(parse(&format!("a={}.example.com", label)).is_err());

        let long_host = vec!["abcdefghi"; 26].join(".");
        assert!(long_host.len() > MAX_HOSTNAME_LEN);
        assert!(parse(&format!("a={}", long_host)).is_err());
    }

    #[test]
    fn test_rejects_empty_and_malformed_json() {
        assert_eq!(parse("   "), Err(RegistryError::Empty));
        assert_eq!(parse("[]"), Err(RegistryError::Empty));
        assert!(matches!(
            parse(r#"[{"name":"a"}]"#),
            Err(RegistryError::InvalidJson(_))
        ));
        assert!(matches!(parse("[1,2]"), Err(RegistryError::InvalidJson(_))));
    }

    #[test]
    fn test_rejects_same_name_for_different_hosts() {
        assert!(matches!(
            parse("a=h1.example.com,A=h2.example.com"),
            Err(RegistryError::DuplicateName { index: 1, .. })
        ));
    }

    #[test]
    fn test_trailing_comma_is_malformed() {
        assert!(matches!(
            parse("a=h1.example.com,"),
            Err(RegistryError::InvalidEntry { index: 1, .. })
        ));
    }
}
