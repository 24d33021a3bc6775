//! Storage Reconciler
//!
//! Reconstructs component storage from the cluster (workload mounts plus
//! persistent volume claims) and converges it towards the declared volumes.
//!
//! Listing validates the wiring in both directions: every claim must be
//! mounted by a container, and every mount must be backed by a claim or by a
//! non-claim volume of the workload. Any violation is a hard error; a partial
//! view is never returned.

use crate::domain::quantity;
use crate::domain::{
    classify, ComponentRef, ReconciliationState, StorageClientRef, StorageSpec,
    DEFAULT_STORAGE_SIZE,
};
use crate::error::{Error, Result};
use crate::kubernetes::labels::{storage_labels, Selector, SOURCE_PVC_LABEL, STORAGE_LABEL};
use crate::reconcile::naming::{resolve_child_name_within, MAX_NAME_LENGTH};
use crate::reconcile::reconciler::{self, Applier, FieldDiff, PushSummary, Reconcilable};
use crate::reconcile::wiring::{cross_reference, mount_name_for_claim, MOUNT_SUFFIX, RESERVED_MOUNTS};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, Volume, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

const STORAGE_RESOURCE: &str = "storage";
const ACCESS_MODE: &str = "ReadWriteOnce";

impl Reconcilable for StorageSpec {
    const KIND: &'static str = "storage";

    fn name(&self) -> &str {
        &self.name
    }

    /// Size is shared by every record of a claim. Path is compared against
    /// the record of the declared container; records without a container
    /// (a bare claim) only carry the size.
    fn diff(&self, observed: &[&Self]) -> Result<Option<FieldDiff>> {
        let Some(first) = observed.first() else {
            return Ok(None);
        };
        if !quantity::same_size(&self.size, &first.size)? {
            return Ok(Some(FieldDiff::new("size", &self.size, &first.size)));
        }

        let wired: Vec<_> = observed.iter().filter(|o| !o.container.is_empty()).collect();
        if wired.is_empty() {
            return Ok(None);
        }
        let record = if self.container.is_empty() {
            wired.first()
        } else {
            wired.iter().find(|o| o.container == self.container)
        };
        let Some(record) = record else {
            let containers: Vec<_> = wired.iter().map(|o| o.container.as_str()).collect();
            return Ok(Some(FieldDiff::new(
                "container",
                &self.container,
                containers.join(","),
            )));
        };

        if record.path != self.path {
            return Ok(Some(FieldDiff::new("path", &self.path, &record.path)));
        }
        Ok(None)
    }
}

/// One row of `storage list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageEntry {
    #[serde(flatten)]
    pub spec: StorageSpec,
    pub state: ReconciliationState,
}

/// Logical storage name of a claim, falling back to the object name
pub fn storage_name(claim: &PersistentVolumeClaim) -> String {
    claim
        .labels()
        .get(STORAGE_LABEL)
        .cloned()
        .unwrap_or_else(|| claim.name_any())
}

/// Requested size of a claim
pub fn claim_size(claim: &PersistentVolumeClaim) -> String {
    claim
        .spec
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get(STORAGE_RESOURCE))
        .map(|q| q.0.clone())
        .unwrap_or_default()
}

/// Reconciles the storage of one component
pub struct StorageReconciler {
    client: StorageClientRef,
    component: ComponentRef,
}

impl StorageReconciler {
    pub fn new(client: StorageClientRef, component: ComponentRef) -> Self {
        Self { client, component }
    }

    /// Claim object name for a logical volume; leaves room for the mount suffix
    pub fn claim_name(&self, storage_name: &str) -> Result<String> {
        resolve_child_name_within(
            storage_name,
            &[&self.component.name, &self.component.application],
            MAX_NAME_LENGTH - MOUNT_SUFFIX.len(),
        )
    }

    /// Build the claim object for a declared volume
    pub fn build_claim(&self, storage: &StorageSpec) -> Result<PersistentVolumeClaim> {
        let size = if storage.size.is_empty() {
            DEFAULT_STORAGE_SIZE
        } else {
            storage.size.as_str()
        };
        quantity::validate(size)?;

        let mut requests = BTreeMap::new();
        requests.insert(STORAGE_RESOURCE.to_string(), Quantity(size.to_string()));

        Ok(PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(self.claim_name(&storage.name)?),
                labels: Some(storage_labels(&storage.name, &self.component)),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec![ACCESS_MODE.to_string()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn claim_selector(&self) -> Selector {
        Selector::component(&self.component).without_label(SOURCE_PVC_LABEL)
    }

    /// Claims of this component, excluding the project source claim
    async fn component_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        self.client.list_claims(&self.claim_selector()).await
    }

    /// Reconstruct the storage currently wired into the component workload.
    ///
    /// Yields one record per (claim, container) pair.
    #[instrument(skip(self), fields(component = %self.component))]
    pub async fn list_observed(&self) -> Result<Vec<StorageSpec>> {
        let selector = Selector::component(&self.component);
        let workload = match self.client.get_workload(&selector).await {
            Ok(workload) => workload,
            Err(e) if e.is_not_found() => {
                debug!("No workload yet, nothing is provisioned");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let Some(pod_spec) = workload.spec.as_ref().and_then(|s| s.template.spec.as_ref())
        else {
            return Ok(Vec::new());
        };

        let mounts = cross_reference(pod_spec, &RESERVED_MOUNTS);
        if mounts.is_empty() {
            debug!("Workload has no user volume mounts");
            return Ok(Vec::new());
        }

        let claims = self.component_claims().await?;
        debug!(count = claims.len(), "Listed component claims");

        let mut explained = BTreeSet::new();
        let mut observed = Vec::new();
        for claim in &claims {
            let claim_name = claim.name_any();
            let mount = mount_name_for_claim(&claim_name);
            let users: Vec<_> = mounts.mounting(&mount).collect();
            if users.is_empty() {
                return Err(Error::OrphanedClaim { claim: claim_name });
            }

            let name = storage_name(claim);
            let size = claim_size(claim);
            for (container, mount_point) in users {
                observed.push(StorageSpec::new(&name, &size, &mount_point.path, container));
            }
            explained.insert(mount);
        }

        let volumes: BTreeMap<&str, &Volume> = pod_spec
            .volumes
            .iter()
            .flatten()
            .map(|v| (v.name.as_str(), v))
            .collect();
        for (container, mount_point) in mounts.iter() {
            if explained.contains(&mount_point.name) {
                continue;
            }
            match volumes.get(mount_point.name.as_str()) {
                Some(volume) if volume.persistent_volume_claim.is_none() => {
                    debug!(mount = %mount_point.name, container, "Mount backed by a workload volume");
                }
                _ => {
                    return Err(Error::UnboundMount {
                        mount: mount_point.name.clone(),
                        container: container.to_string(),
                    })
                }
            }
        }

        Ok(observed)
    }

    /// Declared and observed storage with its reconciliation state
    pub async fn list_with_state(&self, declared: &[StorageSpec]) -> Result<Vec<StorageEntry>> {
        let observed = self.list_observed().await?;
        Ok(merge_entries(declared, &observed))
    }

    /// Converge the cluster towards the declared volumes
    pub async fn push(&self, declared: &[StorageSpec]) -> Result<PushSummary> {
        let observed = self.list_observed().await?;
        reconciler::push(declared, &observed, self).await
    }
}

/// Pair every name with its state: observed records keep their container,
/// declared-only records show the declared one
pub fn merge_entries(declared: &[StorageSpec], observed: &[StorageSpec]) -> Vec<StorageEntry> {
    let states = classify(
        declared.iter().map(|s| s.name.as_str()),
        observed.iter().map(|s| s.name.as_str()),
    );
    let state_of = |name: &str| {
        states
            .get(name)
            .copied()
            .unwrap_or(ReconciliationState::Unknown)
    };

    let mut entries = Vec::new();
    let mut seen = BTreeSet::new();
    for wanted in declared {
        if !seen.insert(wanted.name.as_str()) {
            continue;
        }
        let live: Vec<_> = observed.iter().filter(|o| o.name == wanted.name).collect();
        if live.is_empty() {
            entries.push(StorageEntry {
                spec: wanted.clone(),
                state: state_of(&wanted.name),
            });
        }
        for record in live {
            entries.push(StorageEntry {
                spec: record.clone(),
                state: state_of(&record.name),
            });
        }
    }
    for record in observed.iter().filter(|o| !seen.contains(o.name.as_str())) {
        entries.push(StorageEntry {
            spec: record.clone(),
            state: state_of(&record.name),
        });
    }
    entries
}

#[async_trait]
impl Applier<StorageSpec> for StorageReconciler {
    async fn create(&self, entity: &StorageSpec) -> Result<()> {
        let claim = self.build_claim(entity)?;
        info!(storage = %entity.name, claim = %claim.name_any(), "Creating persistent volume claim");
        self.client.create_claim(&claim).await
    }

    async fn delete(&self, entity: &StorageSpec) -> Result<()> {
        let claims: Vec<_> = self
            .component_claims()
            .await?
            .into_iter()
            .filter(|c| storage_name(c) == entity.name)
            .collect();
        if claims.is_empty() {
            return Err(Error::ResourceNotFound {
                kind: "PersistentVolumeClaim".into(),
                name: entity.name.clone(),
            });
        }
        for claim in claims {
            let claim_name = claim.name_any();
            info!(storage = %entity.name, claim = %claim_name, "Deleting persistent volume claim");
            self.client.delete_claim(&claim_name).await?;
        }
        Ok(())
    }

    async fn fetch(&self, name: &str) -> Result<Option<StorageSpec>> {
        Ok(self
            .component_claims()
            .await?
            .iter()
            .find(|c| storage_name(c) == name)
            .map(|c| StorageSpec::new(name, claim_size(c), "", "")))
    }
}
