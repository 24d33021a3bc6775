//! Domain Ports - Entity types and collaborator traits
//!
//! These traits define the boundaries between the reconciliation logic and
//! the cluster / local project description. Adapters implement them; tests
//! substitute in-memory fakes.

use crate::crd::Route;
use crate::error::{Error, Result};
use crate::kubernetes::labels::Selector;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::networking::v1::Ingress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default size for storage declared without one
pub const DEFAULT_STORAGE_SIZE: &str = "1Gi";

/// Default path for URLs declared without one
pub const DEFAULT_URL_PATH: &str = "/";

// =============================================================================
// Component Identity
// =============================================================================

/// The component/application pair that owns every synchronised resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Component name
    pub name: String,
    /// Application the component belongs to
    pub application: String,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            application: application.into(),
        }
    }
}

impl std::fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.application, self.name)
    }
}

// =============================================================================
// Storage Entities
// =============================================================================

/// A storage volume, either declared locally or reconstructed from the cluster.
///
/// Observed storage yields one record per (volume, container) pair, so the
/// same `name` may appear several times with different `container`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Logical volume name
    pub name: String,
    /// Requested size (e.g., "1Gi")
    pub size: String,
    /// Mount path inside the container
    pub path: String,
    /// Container the volume is mounted into
    pub container: String,
}

impl StorageSpec {
    pub fn new(
        name: impl Into<String>,
        size: impl Into<String>,
        path: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            path: path.into(),
            container: container.into(),
        }
    }
}

// =============================================================================
// Endpoint Entities
// =============================================================================

/// Kind of cluster object backing a URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    #[default]
    Ingress,
    Route,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Ingress => write!(f, "ingress"),
            EndpointKind::Route => write!(f, "route"),
        }
    }
}

/// A network endpoint (URL), either declared locally or observed on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    /// Logical URL name
    pub name: String,
    /// Base host; ingresses are exposed as `<name>.<host>`
    pub host: String,
    /// Target container port
    pub port: u16,
    /// Whether TLS is configured
    pub secure: bool,
    /// TLS secret name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret: Option<String>,
    /// HTTP path
    pub path: String,
    /// Backing object kind
    pub kind: EndpointKind,
}

impl EndpointSpec {
    /// Convenience constructor for an insecure ingress at `/`
    pub fn ingress(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            secure: false,
            tls_secret: None,
            path: DEFAULT_URL_PATH.to_string(),
            kind: EndpointKind::Ingress,
        }
    }

    /// Convenience constructor for an insecure route at `/`
    pub fn route(name: impl Into<String>, port: u16) -> Self {
        Self {
            kind: EndpointKind::Route,
            ..Self::ingress(name, "", port)
        }
    }
}

// =============================================================================
// Storage Client Port
// =============================================================================

/// Port for the cluster objects behind component storage
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List workloads (deployments) matching a selector
    async fn list_workloads(&self, selector: &Selector) -> Result<Vec<Deployment>>;

    /// List persistent volume claims matching a selector
    async fn list_claims(&self, selector: &Selector) -> Result<Vec<PersistentVolumeClaim>>;

    /// Create a persistent volume claim
    async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()>;

    /// Delete a persistent volume claim by object name
    async fn delete_claim(&self, name: &str) -> Result<()>;

    /// Get the single workload matching a selector.
    ///
    /// Returns `ResourceNotFound` when nothing matches and
    /// `AmbiguousWorkload` when more than one object does.
    async fn get_workload(&self, selector: &Selector) -> Result<Deployment> {
        let mut workloads = self.list_workloads(selector).await?;
        match workloads.len() {
            0 => Err(Error::ResourceNotFound {
                kind: "Deployment".into(),
                name: selector.to_string(),
            }),
            1 => Ok(workloads.remove(0)),
            count => Err(Error::AmbiguousWorkload {
                selector: selector.to_string(),
                count,
            }),
        }
    }
}

// =============================================================================
// Endpoint Client Port
// =============================================================================

/// Port for the cluster objects behind component URLs
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Whether the cluster serves the route.openshift.io API group
    async fn route_supported(&self) -> Result<bool>;

    /// List ingresses matching a selector
    async fn list_ingresses(&self, selector: &Selector) -> Result<Vec<Ingress>>;

    /// List routes matching a selector
    async fn list_routes(&self, selector: &Selector) -> Result<Vec<Route>>;

    /// Create an ingress
    async fn create_ingress(&self, ingress: &Ingress) -> Result<()>;

    /// Create a route
    async fn create_route(&self, route: &Route) -> Result<()>;

    /// Delete an ingress by object name
    async fn delete_ingress(&self, name: &str) -> Result<()>;

    /// Delete a route by object name
    async fn delete_route(&self, name: &str) -> Result<()>;

    /// Check whether a secret exists in the working namespace
    async fn secret_exists(&self, name: &str) -> Result<bool>;
}

// =============================================================================
// Local Declaration Port
// =============================================================================

/// Port for the locally declared desired state.
///
/// Every call reads the declaration source afresh.
pub trait LocalConfigProvider: Send + Sync {
    /// Component identity
    fn component(&self) -> Result<ComponentRef>;

    /// Declared storage volumes
    fn list_storage(&self) -> Result<Vec<StorageSpec>>;

    /// Declared URLs
    fn list_endpoints(&self) -> Result<Vec<EndpointSpec>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type StorageClientRef = Arc<dyn StorageClient>;
pub type EndpointClientRef = Arc<dyn EndpointClient>;
pub type LocalConfigProviderRef = Arc<dyn LocalConfigProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_kind_display() {
        assert_eq!(format!("{}", EndpointKind::Ingress), "ingress");
        assert_eq!(format!("{}", EndpointKind::Route), "route");
        assert_eq!(EndpointKind::default(), EndpointKind::Ingress);
    }

    #[test]
    fn test_endpoint_constructors() {
        let route = EndpointSpec::route("web", 8080);
        assert_eq!(route.kind, EndpointKind::Route);
        assert_eq!(route.path, "/");
        assert!(!route.secure);

        let ingress = EndpointSpec::ingress("web", "example.com", 8080);
        assert_eq!(ingress.kind, EndpointKind::Ingress);
        assert_eq!(ingress.host, "example.com");
    }

    #[test]
    fn test_component_display() {
        assert_eq!(ComponentRef::new("nodejs", "app").to_string(), "app/nodejs");
    }
}
