//! Reconciliation state classification
//!
//! Derives, for every logical name, whether it is pushed, awaiting a push or
//! only left on the cluster. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle state of a declared/observed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconciliationState {
    /// Declared locally and present on the cluster
    Pushed,
    /// Declared locally, absent from the cluster
    #[serde(rename = "Not Pushed")]
    NotPushed,
    /// Present on the cluster, no longer declared
    #[serde(rename = "Locally Deleted")]
    LocallyDeleted,
    /// Cluster state was not consulted
    Unknown,
}

impl std::fmt::Display for ReconciliationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationState::Pushed => write!(f, "Pushed"),
            ReconciliationState::NotPushed => write!(f, "Not Pushed"),
            ReconciliationState::LocallyDeleted => write!(f, "Locally Deleted"),
            ReconciliationState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Classify every name of `declared ∪ observed`.
///
/// Duplicate observed names (one volume mounted into several containers)
/// collapse to one entry, so every record sharing a name gets the same state.
pub fn classify<'a, D, O>(declared: D, observed: O) -> BTreeMap<String, ReconciliationState>
where
    D: IntoIterator<Item = &'a str>,
    O: IntoIterator<Item = &'a str>,
{
    let declared: BTreeSet<&str> = declared.into_iter().collect();
    let observed: BTreeSet<&str> = observed.into_iter().collect();

    declared
        .union(&observed)
        .map(|name| {
            let state = match (declared.contains(name), observed.contains(name)) {
                (true, true) => ReconciliationState::Pushed,
                (true, false) => ReconciliationState::NotPushed,
                _ => ReconciliationState::LocallyDeleted,
            };
            (name.to_string(), state)
        })
        .collect()
}

/// URL scheme for an endpoint: `https` only when TLS is configured
pub fn protocol(secure: bool) -> &'static str {
    if secure {
        "https"
    } else {
        "http"
    }
}

/// Render a browsable URL for a host
pub fn url_string(secure: bool, host: &str) -> String {
    format!("{}://{}", protocol(secure), host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_partitions_names() {
        let states = classify(["data", "logs"], ["data", "cache"]);

        assert_eq!(states.len(), 3);
        assert_eq!(states["data"], ReconciliationState::Pushed);
        assert_eq!(states["logs"], ReconciliationState::NotPushed);
        assert_eq!(states["cache"], ReconciliationState::LocallyDeleted);
    }

    #[test]
    fn test_classify_collapses_multi_container_records() {
        // "data" is mounted into two containers but declared once
        let states = classify(["data"], ["data", "data"]);
        assert_eq!(states.len(), 1);
        assert_eq!(states["data"], ReconciliationState::Pushed);
    }

    #[test]
    fn test_classify_pushed_iff_in_both() {
        let declared = ["a", "b", "c"];
        let observed = ["b", "c", "d"];
        let states = classify(declared, observed);
        for (name, state) in &states {
            let in_both =
                declared.contains(&name.as_str()) && observed.contains(&name.as_str());
            assert_eq!(*state == ReconciliationState::Pushed, in_both, "{}", name);
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ReconciliationState::NotPushed.to_string(), "Not Pushed");
        assert_eq!(
            ReconciliationState::LocallyDeleted.to_string(),
            "Locally Deleted"
        );
        assert_eq!(
            serde_json::to_string(&ReconciliationState::NotPushed).unwrap(),
            "\"Not Pushed\""
        );
    }

    #[test]
    fn test_protocol_defaults_to_http_without_tls() {
        assert_eq!(protocol(false), "http");
        assert_eq!(protocol(true), "https");
        assert_eq!(url_string(false, "web.example.com"), "http://web.example.com");
    }
}
