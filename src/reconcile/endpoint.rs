//! URL Reconciler
//!
//! Component URLs are exposed either through an Ingress or, on clusters
//! serving `route.openshift.io`, through a Route. Both families are listed by
//! the component labels and keyed by the url-name label; nothing is
//! cross-checked against the workload.

use crate::crd::{Route, RoutePort, RouteSpec, RouteTargetReference, TargetPort, TlsConfig};
use crate::domain::{
    classify, url_string, ComponentRef, EndpointClientRef, EndpointKind, EndpointSpec,
    ReconciliationState, DEFAULT_URL_PATH,
};
use crate::error::{Error, Result};
use crate::kubernetes::labels::{url_labels, Selector, URL_LABEL};
use crate::reconcile::naming::resolve_child_name;
use crate::reconcile::reconciler::{self, Applier, FieldDiff, PushSummary, Reconcilable};
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

const PATH_TYPE: &str = "Prefix";
const INGRESS_OWNER_KIND: &str = "Ingress";

impl Reconcilable for EndpointSpec {
    const KIND: &'static str = "url";

    fn name(&self) -> &str {
        &self.name
    }

    /// Every object carrying the name must agree, so a leftover route next
    /// to a declared ingress is a kind mismatch.
    fn diff(&self, observed: &[&Self]) -> Result<Option<FieldDiff>> {
        for live in observed {
            let diff = if self.kind != live.kind {
                Some(FieldDiff::new("kind", self.kind, live.kind))
            } else if self.port != live.port {
                Some(FieldDiff::new("port", self.port, live.port))
            } else if self.secure != live.secure {
                Some(FieldDiff::new("secure", self.secure, live.secure))
            } else {
                None
            };
            if diff.is_some() {
                return Ok(diff);
            }
        }
        Ok(None)
    }
}

/// One row of `url list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointEntry {
    #[serde(flatten)]
    pub spec: EndpointSpec,
    pub url: String,
    pub state: ReconciliationState,
}

impl EndpointEntry {
    fn new(spec: EndpointSpec, state: ReconciliationState) -> Self {
        let host = public_host(&spec);
        let url = if host.is_empty() {
            String::new()
        } else {
            url_string(spec.secure, &host)
        };
        Self { spec, url, state }
    }
}

/// Host the URL is reachable at
pub fn public_host(spec: &EndpointSpec) -> String {
    match spec.kind {
        EndpointKind::Ingress if !spec.host.is_empty() => format!("{}.{}", spec.name, spec.host),
        _ => spec.host.clone(),
    }
}

/// Entries for declared URLs without consulting the cluster
pub fn offline_entries(declared: &[EndpointSpec]) -> Vec<EndpointEntry> {
    declared
        .iter()
        .map(|spec| EndpointEntry::new(spec.clone(), ReconciliationState::Unknown))
        .collect()
}

fn port_number(port: Option<i32>) -> u16 {
    port.and_then(|p| u16::try_from(p).ok()).unwrap_or_default()
}

fn url_name<K: ResourceExt>(object: &K) -> String {
    object
        .labels()
        .get(URL_LABEL)
        .cloned()
        .unwrap_or_else(|| object.name_any())
}

/// Reconstruct a URL from an ingress
pub fn endpoint_from_ingress(ingress: &Ingress) -> EndpointSpec {
    let name = url_name(ingress);
    let spec = ingress.spec.as_ref();
    let rule = spec.and_then(|s| s.rules.as_ref()).and_then(|r| r.first());
    let path = rule
        .and_then(|r| r.http.as_ref())
        .and_then(|h| h.paths.first());
    let tls = spec.and_then(|s| s.tls.as_ref()).and_then(|t| t.first());

    let full_host = rule.and_then(|r| r.host.clone()).unwrap_or_default();
    let prefix = format!("{}.", name);
    let host = full_host
        .strip_prefix(&prefix)
        .map(str::to_string)
        .unwrap_or(full_host);

    EndpointSpec {
        port: port_number(
            path.and_then(|p| p.backend.service.as_ref())
                .and_then(|s| s.port.as_ref())
                .and_then(|p| p.number),
        ),
        secure: tls.is_some(),
        tls_secret: tls.and_then(|t| t.secret_name.clone()),
        path: path
            .and_then(|p| p.path.clone())
            .unwrap_or_else(|| DEFAULT_URL_PATH.to_string()),
        ..EndpointSpec::ingress(name, host, 0)
    }
}

/// Reconstruct a URL from a route
pub fn endpoint_from_route(route: &Route) -> EndpointSpec {
    let host = route
        .spec
        .host
        .clone()
        .or_else(|| {
            route
                .status
                .as_ref()
                .and_then(|s| s.ingress.first())
                .and_then(|i| i.host.clone())
        })
        .unwrap_or_default();

    EndpointSpec {
        host,
        secure: route.spec.tls.is_some(),
        path: route
            .spec
            .path
            .clone()
            .unwrap_or_else(|| DEFAULT_URL_PATH.to_string()),
        ..EndpointSpec::route(
            url_name(route),
            port_number(route.spec.port.as_ref().and_then(|p| p.target_port.number())),
        )
    }
}

/// Routes generated by the router for an ingress describe the same URL
fn owned_by_ingress(route: &Route) -> bool {
    route
        .owner_references()
        .first()
        .is_some_and(|o| o.kind == INGRESS_OWNER_KIND)
}

/// Reconciles the URLs of one component
pub struct EndpointReconciler {
    client: EndpointClientRef,
    component: ComponentRef,
}

impl EndpointReconciler {
    pub fn new(client: EndpointClientRef, component: ComponentRef) -> Self {
        Self { client, component }
    }

    /// Ingress/route object name for a URL
    pub fn object_name(&self, url: &str) -> Result<String> {
        resolve_child_name(url, &[&self.component.name, &self.component.application])
    }

    /// Secret used by a secure ingress declared without one
    pub fn default_tls_secret(&self) -> String {
        format!("{}-tlssecret", self.component.name)
    }

    fn metadata(&self, url: &EndpointSpec) -> Result<ObjectMeta> {
        Ok(ObjectMeta {
            name: Some(self.object_name(&url.name)?),
            labels: Some(url_labels(&url.name, &self.component)),
            ..Default::default()
        })
    }

    /// Build the ingress exposing a URL at `<name>.<host>`
    pub fn build_ingress(&self, url: &EndpointSpec, tls_secret: Option<String>) -> Result<Ingress> {
        if url.host.is_empty() {
            return Err(Error::Validation(format!(
                "url {}: host is required for an ingress",
                url.name
            )));
        }
        let host = public_host(url);

        let backend = IngressBackend {
            service: Some(IngressServiceBackend {
                name: self.component.name.clone(),
                port: Some(ServiceBackendPort {
                    number: Some(i32::from(url.port)),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        Ok(Ingress {
            metadata: self.metadata(url)?,
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(host.clone()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(url.path.clone()),
                            path_type: PATH_TYPE.to_string(),
                            backend,
                        }],
                    }),
                }]),
                tls: tls_secret.map(|secret| {
                    vec![IngressTLS {
                        hosts: Some(vec![host]),
                        secret_name: Some(secret),
                    }]
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Build the route exposing a URL
    pub fn build_route(&self, url: &EndpointSpec) -> Result<Route> {
        let mut route = Route::new(
            &self.object_name(&url.name)?,
            RouteSpec {
                host: (!url.host.is_empty()).then(|| url.host.clone()),
                path: Some(url.path.clone()),
                to: RouteTargetReference::service(&self.component.name),
                port: Some(RoutePort {
                    target_port: TargetPort::Number(i32::from(url.port)),
                }),
                tls: url.secure.then(TlsConfig::edge),
            },
        );
        route.metadata.labels = Some(url_labels(&url.name, &self.component));
        Ok(route)
    }

    /// List the URLs exposed on the cluster.
    ///
    /// Routes are only consulted when `route_supported` is set.
    #[instrument(skip(self), fields(component = %self.component))]
    pub async fn list_observed(&self, route_supported: bool) -> Result<Vec<EndpointSpec>> {
        let selector = Selector::component(&self.component);

        let mut observed: Vec<EndpointSpec> = self
            .client
            .list_ingresses(&selector)
            .await?
            .iter()
            .map(endpoint_from_ingress)
            .collect();

        if route_supported {
            let routes = self.client.list_routes(&selector).await?;
            observed.extend(
                routes
                    .iter()
                    .filter(|r| !owned_by_ingress(r))
                    .map(endpoint_from_route),
            );
        }

        debug!(count = observed.len(), "Listed component urls");
        Ok(observed)
    }

    /// Drop declared routes the cluster cannot serve
    fn supported(&self, declared: &[EndpointSpec], route_supported: bool) -> Vec<EndpointSpec> {
        declared
            .iter()
            .filter(|url| {
                let keep = route_supported || url.kind != EndpointKind::Route;
                if !keep {
                    warn!(url = %url.name, "Routes are not supported on this cluster, skipping url");
                }
                keep
            })
            .cloned()
            .collect()
    }

    /// Declared and observed URLs with their reconciliation state
    pub async fn list_with_state(&self, declared: &[EndpointSpec]) -> Result<Vec<EndpointEntry>> {
        let route_supported = self.client.route_supported().await?;
        let declared = self.supported(declared, route_supported);
        let observed = self.list_observed(route_supported).await?;
        Ok(merge_entries(&declared, &observed))
    }

    /// Converge the cluster towards the declared URLs
    pub async fn push(&self, declared: &[EndpointSpec]) -> Result<PushSummary> {
        let route_supported = self.client.route_supported().await?;
        let declared = self.supported(declared, route_supported);
        let observed = self.list_observed(route_supported).await?;
        reconciler::push(&declared, &observed, self).await
    }

    async fn create_ingress(&self, url: &EndpointSpec) -> Result<()> {
        let tls_secret = if url.secure {
            let secret = url
                .tls_secret
                .clone()
                .unwrap_or_else(|| self.default_tls_secret());
            if !self.client.secret_exists(&secret).await? {
                return Err(Error::ResourceNotFound {
                    kind: "Secret".into(),
                    name: secret,
                });
            }
            Some(secret)
        } else {
            None
        };

        let ingress = self.build_ingress(url, tls_secret)?;
        info!(url = %url.name, ingress = %ingress.name_any(), "Creating ingress");
        self.client.create_ingress(&ingress).await
    }

    async fn create_route(&self, url: &EndpointSpec) -> Result<()> {
        if !self.client.route_supported().await? {
            return Err(Error::RouteUnsupported {
                name: url.name.clone(),
            });
        }
        let route = self.build_route(url)?;
        info!(url = %url.name, route = %route.name_any(), "Creating route");
        self.client.create_route(&route).await
    }
}

/// Pair every URL name with its state; declared entries win for display
pub fn merge_entries(declared: &[EndpointSpec], observed: &[EndpointSpec]) -> Vec<EndpointEntry> {
    let states = classify(
        declared.iter().map(|u| u.name.as_str()),
        observed.iter().map(|u| u.name.as_str()),
    );
    let state_of = |name: &str| {
        states
            .get(name)
            .copied()
            .unwrap_or(ReconciliationState::Unknown)
    };

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for url in declared.iter().chain(observed) {
        if seen.insert(url.name.as_str()) {
            entries.push(EndpointEntry::new(url.clone(), state_of(&url.name)));
        }
    }
    entries
}

#[async_trait]
impl Applier<EndpointSpec> for EndpointReconciler {
    async fn create(&self, entity: &EndpointSpec) -> Result<()> {
        match entity.kind {
            EndpointKind::Ingress => self.create_ingress(entity).await,
            EndpointKind::Route => self.create_route(entity).await,
        }
    }

    /// Removes every ingress and route carrying the url name, whatever the
    /// kind of `entity`
    async fn delete(&self, entity: &EndpointSpec) -> Result<()> {
        let selector = Selector::component(&self.component).with_label(URL_LABEL, &entity.name);
        let mut objects: Vec<(EndpointKind, String)> = self
            .client
            .list_ingresses(&selector)
            .await?
            .iter()
            .map(|i| (EndpointKind::Ingress, i.name_any()))
            .collect();
        if self.client.route_supported().await? {
            objects.extend(
                self.client
                    .list_routes(&selector)
                    .await?
                    .iter()
                    .filter(|r| !owned_by_ingress(r))
                    .map(|r| (EndpointKind::Route, r.name_any())),
            );
        }
        if objects.is_empty() {
            // objects created without the url label are named after the url
            objects.push((entity.kind, entity.name.clone()));
        }

        for (kind, name) in objects {
            info!(url = %entity.name, %kind, object = %name, "Deleting url");
            match kind {
                EndpointKind::Ingress => self.client.delete_ingress(&name).await?,
                EndpointKind::Route => self.client.delete_route(&name).await?,
            }
        }
        Ok(())
    }

    async fn fetch(&self, name: &str) -> Result<Option<EndpointSpec>> {
        let route_supported = self.client.route_supported().await?;
        Ok(self
            .list_observed(route_supported)
            .await?
            .into_iter()
            .find(|u| u.name == name))
    }
}
