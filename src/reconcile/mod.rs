//! Reconciliation
//!
//! Naming, mount cross-referencing, the generic push algorithm and the two
//! entity families built on it (storage and URLs).

pub mod endpoint;
pub mod naming;
pub mod reconciler;
pub mod storage;
pub mod wiring;

#[cfg(test)]
pub(crate) mod fake;

pub use endpoint::{EndpointEntry, EndpointReconciler};
pub use naming::{resolve_child_name, resolve_child_name_within};
pub use reconciler::{plan, push, Applier, Plan, PushSummary, Reconcilable};
pub use storage::{StorageEntry, StorageReconciler};
