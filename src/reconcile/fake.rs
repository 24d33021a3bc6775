//! In-memory cluster used by reconciler tests

use crate::crd::Route;
use crate::domain::{ComponentRef, EndpointClient, StorageClient};
use crate::error::{Error, Result};
use crate::kubernetes::labels::{component_labels, Selector};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PodSpec, PodTemplateSpec};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use parking_lot::Mutex;
use std::collections::BTreeSet;

/// Fake implementing both cluster ports, recording every call
#[derive(Default)]
pub(crate) struct FakeCluster {
    workloads: Mutex<Vec<Deployment>>,
    claims: Mutex<Vec<PersistentVolumeClaim>>,
    ingresses: Mutex<Vec<Ingress>>,
    routes: Mutex<Vec<Route>>,
    secrets: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
    pub routes_supported: bool,
}

impl FakeCluster {
    pub(crate) fn with_routes() -> Self {
        Self {
            routes_supported: true,
            ..Default::default()
        }
    }

    pub(crate) fn add_workload(&self, workload: Deployment) {
        self.workloads.lock().push(workload);
    }

    pub(crate) fn add_claim(&self, claim: PersistentVolumeClaim) {
        self.claims.lock().push(claim);
    }

    pub(crate) fn add_ingress(&self, ingress: Ingress) {
        self.ingresses.lock().push(ingress);
    }

    pub(crate) fn add_route(&self, route: Route) {
        self.routes.lock().push(route);
    }

    pub(crate) fn add_secret(&self, name: &str) {
        self.secrets.lock().insert(name.to_string());
    }

    pub(crate) fn ingress_names(&self) -> Vec<String> {
        self.ingresses.lock().iter().map(|i| i.name_any()).collect()
    }

    pub(crate) fn route_names(&self) -> Vec<String> {
        self.routes.lock().iter().map(|r| r.name_any()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Create and delete calls only
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("create ") || c.starts_with("delete "))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn list<K>(&self, store: &Mutex<Vec<K>>, selector: &Selector) -> Vec<K>
    where
        K: Resource<DynamicType = ()> + Clone,
    {
        self.record(format!("list {}", K::kind(&())));
        store
            .lock()
            .iter()
            .filter(|o| selector.matches(o.meta().labels.as_ref()))
            .cloned()
            .collect()
    }

    fn create<K>(&self, store: &Mutex<Vec<K>>, object: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Clone,
    {
        let name = object.name_any();
        self.record(format!("create {} {}", K::kind(&()), name));
        let mut objects = store.lock();
        if objects.iter().any(|o| o.name_any() == name) {
            return Err(Error::ResourceExists {
                kind: K::kind(&()).to_string(),
                name,
            });
        }
        objects.push(object.clone());
        Ok(())
    }

    fn delete<K>(&self, store: &Mutex<Vec<K>>, name: &str) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Clone,
    {
        self.record(format!("delete {} {}", K::kind(&()), name));
        let mut objects = store.lock();
        let before = objects.len();
        objects.retain(|o| o.name_any() != name);
        if objects.len() == before {
            return Err(Error::ResourceNotFound {
                kind: K::kind(&()).to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for FakeCluster {
    async fn list_workloads(&self, selector: &Selector) -> Result<Vec<Deployment>> {
        Ok(self.list(&self.workloads, selector))
    }

    async fn list_claims(&self, selector: &Selector) -> Result<Vec<PersistentVolumeClaim>> {
        Ok(self.list(&self.claims, selector))
    }

    async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        self.create(&self.claims, claim)
    }

    async fn delete_claim(&self, name: &str) -> Result<()> {
        self.delete(&self.claims, name)
    }
}

#[async_trait]
impl EndpointClient for FakeCluster {
    async fn route_supported(&self) -> Result<bool> {
        Ok(self.routes_supported)
    }

    async fn list_ingresses(&self, selector: &Selector) -> Result<Vec<Ingress>> {
        Ok(self.list(&self.ingresses, selector))
    }

    async fn list_routes(&self, selector: &Selector) -> Result<Vec<Route>> {
        Ok(self.list(&self.routes, selector))
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()> {
        self.create(&self.ingresses, ingress)
    }

    async fn create_route(&self, route: &Route) -> Result<()> {
        self.create(&self.routes, route)
    }

    async fn delete_ingress(&self, name: &str) -> Result<()> {
        self.delete(&self.ingresses, name)
    }

    async fn delete_route(&self, name: &str) -> Result<()> {
        self.delete(&self.routes, name)
    }

    async fn secret_exists(&self, name: &str) -> Result<bool> {
        self.record(format!("get Secret {}", name));
        Ok(self.secrets.lock().contains(name))
    }
}

/// Deployment of a component running the given pod spec
pub(crate) fn workload(component: &ComponentRef, pod_spec: PodSpec) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", component.name, component.application)),
            labels: Some(component_labels(component)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
