//! Candidate relay server descriptors
//!
//! A `ServerDescriptor` is created once from the validated registry and never
//! mutated afterwards.

use serde::Serialize;
use std::net::Ipv6Addr;

/// A candidate TURN relay: a stable name plus the host it is reached on
///
/// Fields are private so descriptors can only come out of registry validation
/// (or the test-only constructor path via `new`). IPv6 literals are stored
/// without brackets; use [`bracket_host`] when building URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerDescriptor {
    name: String,
    host: String,
}

impl ServerDescriptor {
    /// Create a descriptor from an already-validated name and host
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// Get the server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the server host (IPv6 without brackets)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host formatted for use inside a URL authority
    pub fn url_host(&self) -> String {
        bracket_host(&self.host)
    }
}

/// Wrap IPv6 literals in brackets, leave everything else untouched
pub fn bracket_host(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}
