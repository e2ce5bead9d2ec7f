//! Execution-context gate.
//!
//! The workflow sends the user's session tokens to the remote service, so it
//! only runs when the execution context belongs to the service itself.

use crate::constants::{ALLOWED_HOSTS, CANONICAL_HOST};

/// Outcome of a host check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Reject(String),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Allow-list check on the execution context's host name.
#[derive(Debug, Clone)]
pub struct DomainGate {
    allowed: Vec<String>,
}

impl DomainGate {
    /// Gate for the production service (`ugphone.com`, `www.ugphone.com`).
    pub fn production() -> Self {
        Self::with_hosts(ALLOWED_HOSTS.iter().copied())
    }

    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: hosts
                .into_iter()
                .map(|h| normalize_host(h.as_ref()))
                .collect(),
        }
    }

    /// Validate a host name. Comparison ignores ASCII case and a trailing dot.
    pub fn validate(&self, host: &str) -> GateDecision {
        let host = normalize_host(host);
        if host.is_empty() {
            return GateDecision::Reject("No host name for the current context".to_string());
        }
        if self.allowed.iter().any(|allowed| *allowed == host) {
            GateDecision::Allow
        } else {
            GateDecision::Reject(format!(
                "'{}' is not {} - open the tool on the {} site",
                host, CANONICAL_HOST, CANONICAL_HOST
            ))
        }
    }
}

impl Default for DomainGate {
    fn default() -> Self {
        Self::production()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
