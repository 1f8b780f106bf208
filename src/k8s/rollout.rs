//! Image updates and restarts of running deployments

use crate::config::ImageRef;
use crate::k8s::resources::{CORE_TLS_VERIFY_ENV, SYNC_TLS_VERIFY_ENV};
use crate::k8s::wait::ReadinessWaiter;
use crate::utils::errors::{Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use kube::Client;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use serde_json::json;
use std::time::Duration;

pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
const RESTARTED_AT_FORMAT: &str = "%Y%m%d%H%M%S";

const TO_CLOUD: &str = "to-cloud";
const FROM_CLOUD: &str = "from-cloud";

fn containers_mut(deployment: &mut Deployment) -> Option<&mut Vec<Container>> {
    deployment
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()
        .map(|pod| &mut pod.containers)
        .filter(|containers| !containers.is_empty())
}

fn no_containers(deployment: &Deployment) -> Error {
    Error::NoContainers(deployment.metadata.name.clone().unwrap_or_default())
}

/// Set the TLS verification variables of a container.
///
/// `CORE_TLS_VERIFY` carries `tls_verify`, `NO_TLS_VERIFY` its negation. When
/// neither is present, `missing` is appended.
pub fn upsert_tls_verify(env: &mut Vec<EnvVar>, tls_verify: bool, missing: &str) {
    let value_for = |name: &str| {
        if name == SYNC_TLS_VERIFY_ENV {
            (!tls_verify).to_string()
        } else {
            tls_verify.to_string()
        }
    };

    let mut found = false;
    for var in env.iter_mut() {
        if var.name == CORE_TLS_VERIFY_ENV || var.name == SYNC_TLS_VERIFY_ENV {
            var.value = Some(value_for(&var.name));
            var.value_from = None;
            found = true;
        }
    }
    if !found {
        env.push(EnvVar {
            name: missing.to_string(),
            value: Some(value_for(missing)),
            ..Default::default()
        });
    }
}

/// Replace the primary container's image and set its TLS variables
pub fn set_primary_image(deployment: &mut Deployment, image: &str, tls_verify: bool) -> Result<()> {
    let err = no_containers(deployment);
    let container = containers_mut(deployment)
        .and_then(|c| c.first_mut())
        .ok_or(err)?;
    container.image = Some(image.to_string());
    upsert_tls_verify(
        container.env.get_or_insert_with(Vec::new),
        tls_verify,
        CORE_TLS_VERIFY_ENV,
    );
    Ok(())
}

/// Retag the sync containers, keeping each one's repository.
/// Returns how many containers were changed.
pub fn set_sync_images(deployment: &mut Deployment, tag: &str, tls_verify: bool) -> Result<usize> {
    let err = no_containers(deployment);
    let containers = containers_mut(deployment).ok_or(err)?;

    let mut updated = 0;
    for container in containers
        .iter_mut()
        .filter(|c| c.name.contains(TO_CLOUD) || c.name.contains(FROM_CLOUD))
    {
        let current = container.image.as_deref().unwrap_or_default();
        let repository = ImageRef::parse(current).repository;
        container.image = Some(ImageRef::with_tag(&repository, tag));
        upsert_tls_verify(
            container.env.get_or_insert_with(Vec::new),
            tls_verify,
            SYNC_TLS_VERIFY_ENV,
        );
        updated += 1;
    }
    Ok(updated)
}

/// Updates deployments selected by label in one namespace
#[derive(Clone)]
pub struct RolloutUpdater {
    client: Client,
    namespace: String,
    waiter: ReadinessWaiter,
}

impl RolloutUpdater {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            waiter: ReadinessWaiter::new(client.clone()),
            client,
            namespace: namespace.into(),
        }
    }

    pub fn with_waiter(mut self, waiter: ReadinessWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    fn api(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// The single deployment matching `selector`
    pub async fn find_single(&self, selector: &str) -> Result<Deployment> {
        let mut list = self
            .api()
            .list(&ListParams::default().labels(selector))
            .await?
            .items;
        match list.len() {
            0 => Err(Error::NoDeploymentFound(selector.to_string())),
            1 => Ok(list.remove(0)),
            _ => Err(Error::AmbiguousSelector {
                selector: selector.to_string(),
                names: list.into_iter().filter_map(|d| d.metadata.name).collect(),
            }),
        }
    }

    async fn replace(&self, deployment: &Deployment) -> Result<Deployment> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        Ok(self
            .api()
            .replace(&name, &PostParams::default(), deployment)
            .await?)
    }

    /// Point the primary container at `image`
    pub async fn update_image(
        &self,
        selector: &str,
        image: &str,
        tls_verify: bool,
    ) -> Result<Deployment> {
        let mut deployment = self.find_single(selector).await?;
        set_primary_image(&mut deployment, image, tls_verify)?;
        let updated = self.replace(&deployment).await?;
        crate::log_info!(
            "Updated deployment {} to {}",
            updated.metadata.name.as_deref().unwrap_or_default(),
            image
        );
        Ok(updated)
    }

    /// Trigger a rolling restart through the pod template annotation
    pub async fn restart(&self, name: &str) -> Result<()> {
        let now = chrono::Utc::now().format(RESTARTED_AT_FORMAT).to_string();
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": { RESTARTED_AT_ANNOTATION: now }
                    }
                }
            }
        });
        self.api()
            .patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;
        crate::log_debug!("Restarted deployment {}/{}", self.namespace, name);
        Ok(())
    }

    async fn restart_and_wait(
        &self,
        deployment: &Deployment,
        verbose: bool,
        timeout: Duration,
    ) -> Result<()> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.restart(&name).await?;
        self.waiter
            .wait_ready(&self.namespace, &name, verbose, timeout)
            .await
    }

    pub async fn update_and_wait(
        &self,
        selector: &str,
        image: &str,
        tls_verify: bool,
        verbose: bool,
        timeout: Duration,
    ) -> Result<()> {
        let updated = self.update_image(selector, image, tls_verify).await?;
        self.restart_and_wait(&updated, verbose, timeout).await
    }

    /// Retag the sync containers of the selected deployment
    pub async fn update_sync_and_wait(
        &self,
        selector: &str,
        tag: &str,
        tls_verify: bool,
        verbose: bool,
        timeout: Duration,
    ) -> Result<()> {
        let mut deployment = self.find_single(selector).await?;
        let count = set_sync_images(&mut deployment, tag, tls_verify)?;
        if count == 0 {
            crate::log_warn!("No sync containers found with label {}", selector);
        }
        let updated = self.replace(&deployment).await?;
        self.restart_and_wait(&updated, verbose, timeout).await
    }

    /// Replace only the manager image, leaving its environment alone
    pub async fn update_operator_and_wait(
        &self,
        selector: &str,
        image: &str,
        verbose: bool,
        timeout: Duration,
    ) -> Result<()> {
        let mut deployment = self.find_single(selector).await?;
        let err = no_containers(&deployment);
        let container = containers_mut(&mut deployment)
            .and_then(|c| c.first_mut())
            .ok_or(err)?;
        container.image = Some(image.to_string());

        let updated = self.replace(&deployment).await?;
        self.restart_and_wait(&updated, verbose, timeout).await
    }
}
