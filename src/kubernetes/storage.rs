//! Storage port backed by the Kubernetes API

use super::{list_params, map_api_error, Selector};
use crate::domain::StorageClient;
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Deployments and claims of one namespace
#[derive(Clone)]
pub struct KubeStorageClient {
    client: Client,
    namespace: String,
}

impl KubeStorageClient {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn claims(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl StorageClient for KubeStorageClient {
    async fn list_workloads(&self, selector: &Selector) -> Result<Vec<Deployment>> {
        debug!(namespace = %self.namespace, %selector, "Listing deployments");
        let list = self.deployments().list(&list_params(selector)).await?;
        Ok(list.items)
    }

    async fn list_claims(&self, selector: &Selector) -> Result<Vec<PersistentVolumeClaim>> {
        debug!(namespace = %self.namespace, %selector, "Listing persistent volume claims");
        let list = self.claims().list(&list_params(selector)).await?;
        Ok(list.items)
    }

    async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        let name = claim.name_any();
        self.claims()
            .create(&PostParams::default(), claim)
            .await
            .map_err(|e| map_api_error(e, "PersistentVolumeClaim", &name))?;
        debug!(namespace = %self.namespace, claim = %name, "Created persistent volume claim");
        Ok(())
    }

    async fn delete_claim(&self, name: &str) -> Result<()> {
        self.claims()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_api_error(e, "PersistentVolumeClaim", name))?;
        debug!(namespace = %self.namespace, claim = %name, "Deleted persistent volume claim");
        Ok(())
    }
}
