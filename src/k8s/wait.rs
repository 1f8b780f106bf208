//! Waiting for a deployment's pods to run

use crate::utils::errors::{Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::{Api, ListParams};
use kube::core::Selector;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Pod selector of a deployment
pub fn pod_selector(deployment: &Deployment) -> Result<Selector> {
    let selector = deployment
        .spec
        .as_ref()
        .map(|spec| spec.selector.clone())
        .unwrap_or_default();
    Selector::try_from(selector).map_err(|e| {
        Error::InvalidSelector(format!(
            "deployment {}: {}",
            deployment.metadata.name.as_deref().unwrap_or_default(),
            e
        ))
    })
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running")
}

/// Waiting messages of every container of a pod, one per line
fn waiting_messages(pod: &Pod) -> String {
    pod.status
        .iter()
        .flat_map(|s| s.container_statuses.iter().flatten())
        .filter_map(|cs| cs.state.as_ref()?.waiting.as_ref()?.message.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Polls the pods selected by a deployment until they all run
#[derive(Clone)]
pub struct ReadinessWaiter {
    client: Client,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait until every pod of `namespace/name` is running.
    ///
    /// On timeout, `verbose` collects the waiting message of each pod that is
    /// not running into [`Error::PodsNotReady`].
    pub async fn wait_ready(
        &self,
        namespace: &str,
        name: &str,
        verbose: bool,
        timeout: Duration,
    ) -> Result<()> {
        crate::log_debug!(
            "Waiting up to {:?} for deployment {}/{}",
            timeout,
            namespace,
            name
        );

        let poll = async {
            loop {
                if self.is_deployment_ready(namespace, name).await? {
                    return Ok::<_, Error>(());
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                if verbose {
                    let messages = self.pod_messages(namespace, name).await?;
                    if !messages.is_empty() {
                        return Err(Error::PodsNotReady(messages));
                    }
                }
                Err(Error::WaitTimeout {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn selected_pods(&self, namespace: &str, name: &str) -> Result<Vec<Pod>> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let selector = pod_selector(&deployments.get(name).await?)?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default().labels_from(&selector)).await?;
        Ok(list.items)
    }

    /// True when the deployment has pods and every one of them is running
    pub async fn is_deployment_ready(&self, namespace: &str, name: &str) -> Result<bool> {
        let pods = self.selected_pods(namespace, name).await?;
        Ok(!pods.is_empty() && pods.iter().all(is_running))
    }

    /// Waiting messages of the pods that are not running, keyed by pod name
    pub async fn pod_messages(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let pods = self.selected_pods(namespace, name).await?;
        Ok(pods
            .iter()
            .filter(|pod| !is_running(pod))
            .filter_map(|pod| {
                let message = waiting_messages(pod);
                let name = pod.metadata.name.clone()?;
                (!message.is_empty()).then_some((name, message))
            })
            .collect())
    }
}
