//! Label keys and label selectors
//!
//! Every object devsync creates carries the component, application and
//! entity-name labels below, which is how later listings find it again.

use crate::domain::ports::ComponentRef;
use std::collections::{BTreeMap, BTreeSet};

pub const COMPONENT_LABEL: &str = "app.kubernetes.io/instance";
pub const APPLICATION_LABEL: &str = "app.kubernetes.io/part-of";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "devsync";

/// Logical storage name on a claim
pub const STORAGE_LABEL: &str = "devsync.dev/storage-name";
/// Marks the claim holding the project sources
pub const SOURCE_PVC_LABEL: &str = "devsync.dev/source-pvc";
/// Logical URL name on an ingress/route
pub const URL_LABEL: &str = "devsync.dev/url-name";

/// Longest value Kubernetes accepts for a label
pub const MAX_LABEL_VALUE_LENGTH: usize = 63;

/// Whether `value` can be stored as a label value: alphanumerics, `-`, `_`
/// and `.`, starting and ending alphanumeric. Empty values are rejected too,
/// since every label devsync writes names something.
pub fn is_valid_label_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            value.len() <= MAX_LABEL_VALUE_LENGTH
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

/// Labels identifying a component's objects
pub fn component_labels(component: &ComponentRef) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(COMPONENT_LABEL.to_string(), component.name.clone());
    labels.insert(APPLICATION_LABEL.to_string(), component.application.clone());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

/// Labels for a claim backing a storage volume
pub fn storage_labels(storage_name: &str, component: &ComponentRef) -> BTreeMap<String, String> {
    let mut labels = component_labels(component);
    labels.insert(STORAGE_LABEL.to_string(), storage_name.to_string());
    labels
}

/// Labels for an ingress/route backing a URL
pub fn url_labels(url_name: &str, component: &ComponentRef) -> BTreeMap<String, String> {
    let mut labels = component_labels(component);
    labels.insert(URL_LABEL.to_string(), url_name.to_string());
    labels
}

// =============================================================================
// Selector
// =============================================================================

/// Label selector with `key=value` and `!key` terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    equals: BTreeMap<String, String>,
    absent: BTreeSet<String>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select objects of one component
    pub fn component(component: &ComponentRef) -> Self {
        Self::new()
            .with_label(COMPONENT_LABEL, &component.name)
            .with_label(APPLICATION_LABEL, &component.application)
    }

    /// Require `key=value`
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    /// Require that `key` is not set
    pub fn without_label(mut self, key: impl Into<String>) -> Self {
        self.absent.insert(key.into());
        self
    }

    /// Evaluate the selector against an object's labels
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let empty = BTreeMap::new();
        let labels = labels.unwrap_or(&empty);
        self.equals
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
            && self.absent.iter().all(|k| !labels.contains_key(k))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let terms: Vec<String> = self
            .equals
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .chain(self.absent.iter().map(|k| format!("!{}", k)))
            .collect();
        write!(f, "{}", terms.join(","))
    }
}
