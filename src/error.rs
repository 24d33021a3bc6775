//! Error types for devsync
//!
//! Provides structured error types for listing, reconciling and
//! provisioning component storage and URLs.

use thiserror::Error;

/// Unified error type for the CLI and library
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Reconciliation Integrity Errors
    // =========================================================================
    #[error("more than one workload ({count}) matches selector {selector}")]
    AmbiguousWorkload { selector: String, count: usize },

    #[error("persistent volume claim {claim} is not mounted by any container of the component")]
    OrphanedClaim { claim: String },

    #[error("volume mount {mount} in container {container} is not backed by a claim or a workload volume")]
    UnboundMount { mount: String, container: String },

    #[error("{kind} {name}: declared {field} {declared} differs from {observed} on the cluster; delete and recreate it to apply the change")]
    SpecMismatch {
        kind: String,
        name: String,
        field: String,
        declared: String,
        observed: String,
    },

    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("routes are not available on this cluster, url {name} cannot be created")]
    RouteUnsupported { name: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("invalid quantity {value:?}: {reason}")]
    InvalidQuantity { value: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound { .. } => true,
            Error::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// Check if this error means a create hit an existing object
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::ResourceExists { .. } => true,
            Error::Kube(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }

    /// Check if this error reports drift between the cluster and the
    /// component wiring, which has to be repaired by hand
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousWorkload { .. }
                | Error::OrphanedClaim { .. }
                | Error::UnboundMount { .. }
                | Error::SpecMismatch { .. }
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_)
            | Error::Validation(_)
            | Error::Yaml(_)
            | Error::InvalidQuantity { .. }
            | Error::InvalidIdentifier { .. } => 2,
            _ => 1,
        }
    }
}

/// Result type alias for devsync
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::ResourceNotFound {
            kind: "PersistentVolumeClaim".into(),
            name: "data-nodejs-app".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());

        let err = Error::ResourceExists {
            kind: "Ingress".into(),
            name: "web-nodejs-app".into(),
        };
        assert!(err.is_already_exists());

        let err = Error::OrphanedClaim {
            claim: "data-nodejs-app".into(),
        };
        assert!(err.is_integrity_violation());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_messages_are_single_line_and_name_qualified() {
        let err = Error::SpecMismatch {
            kind: "storage".into(),
            name: "data".into(),
            field: "size".into(),
            declared: "5Gi".into(),
            observed: "1Gi".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data"));
        assert!(msg.contains("5Gi"));
        assert!(!msg.contains('\n'));

        let err = Error::Validation("port must be positive".into());
        assert_eq!(err.exit_code(), 2);
    }
}
