//! Mount/volume cross-referencing
//!
//! Extracts the user-visible volume mounts of a workload's pod spec: mounts
//! of regular containers, minus infrastructure volumes and minus volumes
//! that only init containers use.

use indexmap::IndexMap;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use std::collections::BTreeSet;

/// Volume holding the synchronised project sources
pub const SOURCE_VOLUME: &str = "devsync-projects";

/// Volume shared with the supervisor init container
pub const SUPERVISORD_VOLUME: &str = "devsync-supervisord-shared-data";

/// Mount names managed by devsync itself, never reported as storage
pub const RESERVED_MOUNTS: [&str; 2] = [SOURCE_VOLUME, SUPERVISORD_VOLUME];

/// Suffix appended to a claim name to form its pod volume name
pub const MOUNT_SUFFIX: &str = "-vol";

/// Pod volume name for a claim
pub fn mount_name_for_claim(claim_name: &str) -> String {
    format!("{}{}", claim_name, MOUNT_SUFFIX)
}

/// One volume mount inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub name: String,
    pub path: String,
}

/// Mount names referenced by init and by regular containers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountUsage {
    pub init: BTreeSet<String>,
    pub regular: BTreeSet<String>,
}

impl MountUsage {
    pub fn from_containers(init_containers: &[Container], containers: &[Container]) -> Self {
        Self {
            init: mount_names(init_containers),
            regular: mount_names(containers),
        }
    }

    /// Mounted by at least one init container and by no regular container
    pub fn is_init_only(&self, mount: &str) -> bool {
        self.init.contains(mount) && !self.regular.contains(mount)
    }
}

fn mount_names(containers: &[Container]) -> BTreeSet<String> {
    containers
        .iter()
        .flat_map(|c| c.volume_mounts.iter().flatten())
        .map(|m| m.name.clone())
        .collect()
}

/// Surviving mounts grouped by container, in pod spec order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMounts {
    by_container: IndexMap<String, Vec<MountPoint>>,
}

impl ContainerMounts {
    pub fn is_empty(&self) -> bool {
        self.by_container.is_empty()
    }

    /// Mounts of one container
    pub fn container(&self, name: &str) -> Option<&[MountPoint]> {
        self.by_container.get(name).map(Vec::as_slice)
    }

    /// Every (container, mount) pair
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MountPoint)> {
        self.by_container
            .iter()
            .flat_map(|(c, mounts)| mounts.iter().map(move |m| (c.as_str(), m)))
    }

    /// The (container, mount) pairs using a given mount name
    pub fn mounting<'a>(&'a self, mount: &'a str) -> impl Iterator<Item = (&'a str, &'a MountPoint)> {
        self.iter().filter(move |(_, m)| m.name == mount)
    }

    /// Distinct mount names across all containers
    pub fn mount_names(&self) -> BTreeSet<&str> {
        self.iter().map(|(_, m)| m.name.as_str()).collect()
    }
}

/// Cross-reference the mounts of a pod spec.
///
/// A mount name with no regular-container reference is simply absent from
/// the result; it may be init-only infrastructure wiring.
pub fn cross_reference(pod_spec: &PodSpec, reserved: &[&str]) -> ContainerMounts {
    let init_containers = pod_spec.init_containers.as_deref().unwrap_or_default();
    let usage = MountUsage::from_containers(init_containers, &pod_spec.containers);

    let mut by_container: IndexMap<String, Vec<MountPoint>> = IndexMap::new();
    for container in &pod_spec.containers {
        let mounts: Vec<MountPoint> = container
            .volume_mounts
            .iter()
            .flatten()
            .filter(|m| !reserved.contains(&m.name.as_str()))
            .filter(|m| !usage.is_init_only(&m.name))
            .map(|m| MountPoint {
                name: m.name.clone(),
                path: m.mount_path.clone(),
            })
            .collect();
        if !mounts.is_empty() {
            by_container.insert(container.name.clone(), mounts);
        }
    }

    ContainerMounts { by_container }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::VolumeMount;

    pub(crate) fn container(name: &str, mounts: &[(&str, &str)]) -> Container {
        Container {
            name: name.to_string(),
            volume_mounts: if mounts.is_empty() {
                None
            } else {
                Some(
                    mounts
                        .iter()
                        .map(|(n, p)| VolumeMount {
                            name: n.to_string(),
                            mount_path: p.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                )
            },
            ..Default::default()
        }
    }

    fn pod(init: Vec<Container>, containers: Vec<Container>) -> PodSpec {
        PodSpec {
            init_containers: if init.is_empty() { None } else { Some(init) },
            containers,
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_mounts_by_container() {
        let spec = pod(
            vec![],
            vec![
                container("runtime", &[("data-vol", "/data"), ("logs-vol", "/logs")]),
                container("sidecar", &[("logs-vol", "/logs")]),
            ],
        );
        let mounts = cross_reference(&spec, &RESERVED_MOUNTS);

        assert_eq!(mounts.container("runtime").unwrap().len(), 2);
        assert_eq!(mounts.container("sidecar").unwrap().len(), 1);
        assert_eq!(mounts.mounting("logs-vol").count(), 2);
        assert_eq!(mounts.mount_names().len(), 2);
    }

    #[test]
    fn test_reserved_mounts_are_skipped() {
        let spec = pod(
            vec![],
            vec![container(
                "runtime",
                &[(SOURCE_VOLUME, "/projects"), (SUPERVISORD_VOLUME, "/opt/devsync")],
            )],
        );
        assert!(cross_reference(&spec, &RESERVED_MOUNTS).is_empty());
    }

    #[test]
    fn test_init_only_mounts_are_skipped() {
        let spec = pod(
            vec![container("copy-supervisord", &[("shared-vol", "/opt/")])],
            vec![container("runtime", &[("shared-vol", "/opt/")]), container("idle", &[])],
        );
        // mounted by both init and regular container: kept
        let mounts = cross_reference(&spec, &[]);
        assert_eq!(mounts.mounting("shared-vol").count(), 1);
        assert!(mounts.container("idle").is_none());

        let spec = pod(
            vec![container("copy-supervisord", &[("shared-vol", "/opt/")])],
            vec![container("runtime", &[])],
        );
        assert!(cross_reference(&spec, &[]).is_empty());
    }

    #[test]
    fn test_mount_usage() {
        let usage = MountUsage::from_containers(
            &[container("init", &[("a", "/a"), ("b", "/b")])],
            &[container("main", &[("b", "/b")])],
        );
        assert!(usage.is_init_only("a"));
        assert!(!usage.is_init_only("b"));
        assert!(!usage.is_init_only("c"));
    }

    #[test]
    fn test_mount_name_for_claim() {
        assert_eq!(mount_name_for_claim("data-nodejs-app"), "data-nodejs-app-vol");
    }
}
