//! Endpoint port backed by the Kubernetes API

use super::{list_params, map_api_error, Selector};
use crate::crd::{Route, ROUTE_GROUP};
use crate::domain::EndpointClient;
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, PostParams};
use kube::discovery::Discovery;
use kube::{Api, Client, ResourceExt};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Ingresses, routes and secrets of one namespace
pub struct KubeEndpointClient {
    client: Client,
    namespace: String,
    route_supported: OnceCell<bool>,
}

impl KubeEndpointClient {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            route_supported: OnceCell::new(),
        }
    }

    fn ingresses(&self) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn routes(&self) -> Api<Route> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn discover_routes(&self) -> Result<bool> {
        let discovery = Discovery::new(self.client.clone())
            .filter(&[ROUTE_GROUP])
            .run()
            .await?;
        let supported = discovery.has_group(ROUTE_GROUP);
        info!(supported, "Checked cluster for route support");
        Ok(supported)
    }
}

#[async_trait]
impl EndpointClient for KubeEndpointClient {
    async fn route_supported(&self) -> Result<bool> {
        self.route_supported
            .get_or_try_init(|| self.discover_routes())
            .await
            .copied()
    }

    async fn list_ingresses(&self, selector: &Selector) -> Result<Vec<Ingress>> {
        debug!(namespace = %self.namespace, %selector, "Listing ingresses");
        let list = self.ingresses().list(&list_params(selector)).await?;
        Ok(list.items)
    }

    async fn list_routes(&self, selector: &Selector) -> Result<Vec<Route>> {
        debug!(namespace = %self.namespace, %selector, "Listing routes");
        let list = self.routes().list(&list_params(selector)).await?;
        Ok(list.items)
    }

    async fn create_ingress(&self, ingress: &Ingress) -> Result<()> {
        let name = ingress.name_any();
        self.ingresses()
            .create(&PostParams::default(), ingress)
            .await
            .map_err(|e| map_api_error(e, "Ingress", &name))?;
        Ok(())
    }

    async fn create_route(&self, route: &Route) -> Result<()> {
        let name = route.name_any();
        self.routes()
            .create(&PostParams::default(), route)
            .await
            .map_err(|e| map_api_error(e, "Route", &name))?;
        Ok(())
    }

    async fn delete_ingress(&self, name: &str) -> Result<()> {
        self.ingresses()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_api_error(e, "Ingress", name))?;
        Ok(())
    }

    async fn delete_route(&self, name: &str) -> Result<()> {
        self.routes()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_api_error(e, "Route", name))?;
        Ok(())
    }

    async fn secret_exists(&self, name: &str) -> Result<bool> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(secrets.get_opt(name).await?.is_some())
    }
}
