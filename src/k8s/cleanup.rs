//! Deletion of core instance objects
//!
//! A missing object is never an error here: deleting something that is
//! already gone counts as success.

use crate::k8s::resources::{ResourceKind, format_resource_name};
use crate::utils::errors::{Error, Result, is_api_not_found};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, PropagationPolicy, Resource,
};
use kube::Client;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deletes every object of one kind matching a label selector in a namespace
type DeleteByLabel = for<'a> fn(&'a Client, &'a str, &'a str) -> BoxFuture<'a, Result<()>>;

/// Kinds removed by [`delete_by_label`], dependents first
pub const LABEL_DELETERS: &[(ResourceKind, DeleteByLabel)] = &[
    (ResourceKind::Deployment, |c, ns, sel| {
        Box::pin(delete_collection(Api::<Deployment>::namespaced(c.clone(), ns), sel, true))
    }),
    (ResourceKind::DaemonSet, |c, ns, sel| {
        Box::pin(delete_collection(Api::<DaemonSet>::namespaced(c.clone(), ns), sel, true))
    }),
    (ResourceKind::ConfigMap, |c, ns, sel| {
        Box::pin(delete_collection(Api::<ConfigMap>::namespaced(c.clone(), ns), sel, false))
    }),
    (ResourceKind::Secret, |c, ns, sel| {
        Box::pin(delete_collection(Api::<Secret>::namespaced(c.clone(), ns), sel, false))
    }),
    (ResourceKind::ServiceAccount, |c, ns, sel| {
        Box::pin(delete_collection(Api::<ServiceAccount>::namespaced(c.clone(), ns), sel, false))
    }),
    (ResourceKind::ClusterRoleBinding, |c, _, sel| {
        Box::pin(delete_collection(Api::<ClusterRoleBinding>::all(c.clone()), sel, false))
    }),
    (ResourceKind::ClusterRole, |c, _, sel| {
        Box::pin(delete_collection(Api::<ClusterRole>::all(c.clone()), sel, false))
    }),
];

const VANISH_POLL_INTERVAL: Duration = Duration::from_secs(1);
const VANISH_TIMEOUT: Duration = Duration::from_secs(60);

async fn delete_collection<K>(api: Api<K>, selector: &str, foreground: bool) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let params = if foreground {
        DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        }
    } else {
        DeleteParams::default()
    };
    match api
        .delete_collection(&params, &ListParams::default().labels(selector))
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if is_api_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn delete_named<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(e) if is_api_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Delete every kind in [`LABEL_DELETERS`] matching `selector` in `namespace`
pub async fn delete_by_label(client: &Client, namespace: &str, selector: &str) -> Result<()> {
    for (kind, delete) in LABEL_DELETERS {
        crate::log_debug!("Deleting {} objects matching {}", kind, selector);
        delete(client, namespace, selector).await?;
    }
    Ok(())
}

pub async fn delete_service_by_name(client: &Client, namespace: &str, name: &str) -> Result<()> {
    delete_named(Api::<Service>::namespaced(client.clone(), namespace), name).await
}

/// Names of services in `namespace` matching `selector`
pub async fn find_services_by_label(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Vec<String>> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let services = api.list(&ListParams::default().labels(selector)).await?;
    Ok(services
        .items
        .into_iter()
        .filter_map(|s| s.metadata.name)
        .collect())
}

/// Delete the deterministic set of objects of a core instance from every namespace.
///
/// With `wait`, blocks until the instance deployment is gone (bounded to a minute).
pub async fn delete_core_instance(
    client: &Client,
    name_prefix: &str,
    name: &str,
    environment: &str,
    wait: bool,
) -> Result<()> {
    let resource_name =
        |suffix: &str| format_resource_name(name_prefix, &[name, environment, suffix]);
    let secret = resource_name(ResourceKind::Secret.suffix());
    let account = resource_name(ResourceKind::ServiceAccount.suffix());
    let deployment = resource_name("sync");

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let namespaces: Vec<String> = namespaces
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|ns| ns.metadata.name)
        .collect();

    for ns in &namespaces {
        crate::log_debug!("Deleting core instance {} from namespace {}", name, ns);
        delete_named(Api::<Deployment>::namespaced(client.clone(), ns), &deployment).await?;
        delete_named(Api::<Secret>::namespaced(client.clone(), ns), &secret).await?;
        delete_named(Api::<ServiceAccount>::namespaced(client.clone(), ns), &account).await?;
    }

    delete_named(
        Api::<ClusterRoleBinding>::all(client.clone()),
        &resource_name(ResourceKind::ClusterRoleBinding.suffix()),
    )
    .await?;
    delete_named(
        Api::<ClusterRole>::all(client.clone()),
        &resource_name(ResourceKind::ClusterRole.suffix()),
    )
    .await?;

    if wait {
        wait_for_deployment_removal(client, &namespaces, &deployment).await?;
    }
    Ok(())
}

async fn wait_for_deployment_removal(
    client: &Client,
    namespaces: &[String],
    name: &str,
) -> Result<()> {
    let poll = async {
        loop {
            let mut present = false;
            for ns in namespaces {
                let api: Api<Deployment> = Api::namespaced(client.clone(), ns);
                if api.get_opt(name).await?.is_some() {
                    present = true;
                    break;
                }
            }
            if !present {
                return Ok::<_, Error>(());
            }
            tokio::time::sleep(VANISH_POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(VANISH_TIMEOUT, poll).await {
        Ok(result) => result,
        Err(_) => Err(Error::WaitTimeout {
            namespace: namespaces.join(","),
            name: name.to_string(),
            timeout: VANISH_TIMEOUT,
        }),
    }
}

/// Reference to an object created during a deploy, kept so it can be removed again
#[derive(Debug, Clone)]
pub struct ResourceRollBack {
    pub name: String,
    pub namespace: Option<String>,
    pub resource: ApiResource,
}

impl ResourceRollBack {
    /// Reference a typed object by its metadata
    pub fn from_object<K>(object: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = object.meta();
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            resource: ApiResource::erase::<K>(&()),
        }
    }
}

impl std::fmt::Display for ResourceRollBack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} in {}", self.resource.kind, self.name, ns),
            None => write!(f, "{}/{}", self.resource.kind, self.name),
        }
    }
}

/// Delete arbitrary objects through the dynamic API.
/// Returns the references that were removed (already absent ones included).
pub async fn delete_resources(
    client: &Client,
    resources: Vec<ResourceRollBack>,
) -> Result<Vec<ResourceRollBack>> {
    let mut deleted = Vec::with_capacity(resources.len());
    for r in resources {
        let api: Api<DynamicObject> = match &r.namespace {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &r.resource),
            None => Api::all_with(client.clone(), &r.resource),
        };
        match api.delete(&r.name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(e) if is_api_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }
        crate::log_info!("Deleted {}", r);
        deleted.push(r);
    }
    Ok(deleted)
}
