//! devsync - Storage and URL synchronisation for application components
//!
//! Keeps the persistent volume claims and ingresses/routes of a component on
//! Kubernetes in line with a local declaration file.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        devsync CLI (main.rs)                       │
//! ├───────────────────────────────────────────────────────────────────┤
//! │   Local declaration (config)        Listers (reconcile::storage,  │
//! │   YAML, re-read on every call       reconcile::endpoint)           │
//! │               │                               │                   │
//! │               └───────────┬───────────────────┘                   │
//! │                           │                                       │
//! │              ┌────────────┴────────────┐                          │
//! │              │  plan / push / classify │                          │
//! │              └────────────┬────────────┘                          │
//! ├───────────────────────────┼───────────────────────────────────────┤
//! │            Cluster ports (domain::ports), kube-rs adapters        │
//! │   Deployments, PersistentVolumeClaims, Ingresses, Routes, Secrets │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Local declaration file
//! - [`crd`]: OpenShift Route resource
//! - [`domain`]: Entity types, ports and state classification
//! - [`kubernetes`]: Labels, selectors and kube-rs adapters
//! - [`reconcile`]: Naming, mount cross-referencing and push
//! - [`error`]: Error types and handling

pub mod config;
pub mod crd;
pub mod domain;
pub mod error;
pub mod kubernetes;
pub mod reconcile;

// Re-export commonly used types
pub use config::{ComponentConfig, LocalConfigFile, DEFAULT_CONFIG_PATH};

pub use crd::{Route, RouteSpec};

pub use domain::ports::{
    ComponentRef, EndpointClient, EndpointKind, EndpointSpec, LocalConfigProvider, StorageClient,
    StorageSpec,
};
pub use domain::{classify, ReconciliationState};

pub use error::{Error, Result};

pub use kubernetes::{KubeEndpointClient, KubeStorageClient, Selector};

pub use reconcile::{
    EndpointEntry, EndpointReconciler, Plan, PushSummary, StorageEntry, StorageReconciler,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
