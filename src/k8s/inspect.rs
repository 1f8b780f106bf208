//! Detection of an existing operator install

use crate::config::ImageRef;
use crate::utils::errors::{Error, Result, is_api_not_found};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub const OPERATOR_DEPLOYMENT_NAME: &str = "calyptia-core-controller-manager";
pub const OPERATOR_SERVICE_ACCOUNT: &str = "calyptia-core-controller-manager";

pub const OPERATOR_CLUSTER_ROLES: [&str; 4] = [
    "calyptia-core-manager-role",
    "calyptia-core-metrics-reader",
    "calyptia-core-pod-role",
    "calyptia-core-proxy-role",
];

pub const OPERATOR_CLUSTER_ROLE_BINDINGS: [&str; 2] = [
    "calyptia-core-manager-rolebinding",
    "calyptia-core-proxy-rolebinding",
];

const PIPELINE_GROUP: &str = "core.calyptia.com";
const PIPELINE_VERSION: &str = "v1";
const PIPELINE_KIND: &str = "Pipeline";

/// Objects left behind by a previous operator install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallState {
    pub found: Vec<String>,
}

impl InstallState {
    pub fn is_installed(&self) -> bool {
        !self.found.is_empty()
    }

    /// `Ok` when nothing was found, otherwise every finding in one error
    pub fn into_result(self) -> Result<()> {
        if self.found.is_empty() {
            Ok(())
        } else {
            Err(Error::OperatorIncomplete(self.found))
        }
    }
}

/// Read-only queries about the operator
#[derive(Clone)]
pub struct Inspector {
    client: Client,
}

impl Inspector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Every object named `name` across all namespaces, in one list call
    async fn named_everywhere<K>(&self, name: &str) -> Result<Vec<K>>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&format!("metadata.name={}", name));
        Ok(api.list(&params).await?.items)
    }

    async fn exists<K>(api: Api<K>, name: &str) -> Result<bool>
    where
        K: kube::Resource + Clone + DeserializeOwned + Debug,
    {
        Ok(api.get_opt(name).await?.is_some())
    }

    /// Scan the cluster for every object a previous install creates
    pub async fn is_installed(&self) -> Result<InstallState> {
        let mut state = InstallState::default();

        let gvk = GroupVersionKind::gvk(PIPELINE_GROUP, PIPELINE_VERSION, PIPELINE_KIND);
        let pipelines: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &ApiResource::from_gvk(&gvk));
        match pipelines.list(&ListParams::default().limit(1)).await {
            Ok(_) => state.found.push(format!(
                "Custom Resource Definition {}/{}/pipelines already exists",
                PIPELINE_GROUP, PIPELINE_VERSION
            )),
            Err(e) if is_api_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }

        for deployment in self.named_everywhere::<Deployment>(OPERATOR_DEPLOYMENT_NAME).await? {
            state.found.push(format!(
                "Deployment {} already exists in namespace {}",
                OPERATOR_DEPLOYMENT_NAME,
                deployment.metadata.namespace.unwrap_or_default()
            ));
        }
        for account in self
            .named_everywhere::<ServiceAccount>(OPERATOR_SERVICE_ACCOUNT)
            .await?
        {
            state.found.push(format!(
                "Service Account {} already exists in namespace {}",
                OPERATOR_SERVICE_ACCOUNT,
                account.metadata.namespace.unwrap_or_default()
            ));
        }

        for role in OPERATOR_CLUSTER_ROLES {
            if Self::exists(Api::<ClusterRole>::all(self.client.clone()), role).await? {
                state
                    .found
                    .push(format!("Cluster Role {} already exists", role));
            }
        }

        for binding in OPERATOR_CLUSTER_ROLE_BINDINGS {
            if Self::exists(Api::<ClusterRoleBinding>::all(self.client.clone()), binding).await? {
                state
                    .found
                    .push(format!("Cluster Role Binding {} already exists", binding));
            }
        }

        Ok(state)
    }

    /// The manager deployment in the first namespace that has one.
    /// The API server lists namespaced objects ordered by namespace.
    pub async fn search_manager_across_namespaces(&self) -> Result<Deployment> {
        let manager = self
            .named_everywhere::<Deployment>(OPERATOR_DEPLOYMENT_NAME)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::OperatorNotFound)?;
        crate::log_debug!(
            "Found operator manager in namespace {}",
            manager.metadata.namespace.as_deref().unwrap_or_default()
        );
        Ok(manager)
    }

    /// Image tag of the running operator manager
    pub async fn check_operator_version(&self) -> Result<String> {
        let manager = self.search_manager_across_namespaces().await?;
        manager_version(&manager)
    }
}

/// Tag of the first container image of a manager deployment
pub fn manager_version(deployment: &Deployment) -> Result<String> {
    let name = deployment.metadata.name.clone().unwrap_or_default();
    let image = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .ok_or_else(|| Error::NoContainers(name))?
        .image
        .clone()
        .unwrap_or_default();
    ImageRef::require_tag(&image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::testing::{self, mock_client};
    use http::StatusCode;
    use serde_json::Value;

    const DEPLOYMENTS: &str = "/apis/apps/v1/deployments";
    const SERVICE_ACCOUNTS: &str = "/api/v1/serviceaccounts";

    fn managers(namespaces: &[&str]) -> (StatusCode, Value) {
        let items = namespaces
            .iter()
            .map(|ns| {
                testing::deployment(
                    ns,
                    OPERATOR_DEPLOYMENT_NAME,
                    &[("manager", "ghcr.io/calyptia/core-operator:v2.4.1")],
                )
            })
            .collect();
        testing::ok(testing::list("DeploymentList", "apps/v1", items))
    }

    fn no_accounts() -> (StatusCode, Value) {
        testing::ok(testing::list("ServiceAccountList", "v1", vec![]))
    }

    #[tokio::test]
    async fn test_clean_cluster_is_not_installed() {
        let (client, _) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => managers(&[]),
            SERVICE_ACCOUNTS => no_accounts(),
            _ => testing::not_found(),
        });
        let state = Inspector::new(client).is_installed().await.unwrap();
        assert!(!state.is_installed());
        state.into_result().unwrap();
    }

    #[tokio::test]
    async fn test_residue_is_reported_entry_by_entry() {
        let (client, log) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => managers(&["core"]),
            SERVICE_ACCOUNTS => no_accounts(),
            "/apis/core.calyptia.com/v1/pipelines" => {
                testing::ok(testing::list("PipelineList", "core.calyptia.com/v1", vec![]))
            }
            "/apis/rbac.authorization.k8s.io/v1/clusterroles/calyptia-core-pod-role" => {
                testing::ok(testing::named(
                    "ClusterRole",
                    "rbac.authorization.k8s.io/v1",
                    None,
                    "calyptia-core-pod-role",
                ))
            }
            _ => testing::not_found(),
        });

        let state = Inspector::new(client).is_installed().await.unwrap();
        assert_eq!(state.found.len(), 3);

        let message = state.into_result().unwrap_err().to_string();
        assert!(message.contains("pipelines already exists"));
        assert!(message.contains("in namespace core"));
        assert!(message.contains("Cluster Role calyptia-core-pod-role"));
        assert_eq!(message.lines().count(), 3);

        // one cluster-wide list per namespaced kind, no per-namespace lookups
        let requests = log.lock().unwrap();
        let deployment_calls: Vec<_> = requests
            .iter()
            .filter(|r| r.path.contains("deployments"))
            .collect();
        assert_eq!(deployment_calls.len(), 1);
        assert_eq!(deployment_calls[0].path, DEPLOYMENTS);
        assert!(
            deployment_calls[0]
                .decoded_query()
                .contains("fieldSelector=metadata.name=calyptia-core-controller-manager")
        );
        assert_eq!(
            requests.iter().filter(|r| r.path.contains("serviceaccounts")).count(),
            1
        );
        assert!(!requests.iter().any(|r| r.path == "/api/v1/namespaces"));
    }

    #[tokio::test]
    async fn test_list_failure_is_an_error() {
        let (client, _) = mock_client(|_| testing::status(StatusCode::FORBIDDEN, "Forbidden"));
        let err = Inspector::new(client).is_installed().await.unwrap_err();
        assert!(matches!(err, Error::Kube(_)));
    }

    #[tokio::test]
    async fn test_first_namespace_with_manager_wins() {
        let (client, log) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => managers(&["core", "staging"]),
            _ => testing::not_found(),
        });
        let inspector = Inspector::new(client);
        let manager = inspector.search_manager_across_namespaces().await.unwrap();
        assert_eq!(manager.metadata.namespace.as_deref(), Some("core"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_manager_is_operator_not_found() {
        let (client, _) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => managers(&[]),
            _ => testing::not_found(),
        });
        let err = Inspector::new(client)
            .search_manager_across_namespaces()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OperatorNotFound));
    }

    #[tokio::test]
    async fn test_operator_version_is_the_manager_tag() {
        let (client, _) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => managers(&["core"]),
            _ => testing::not_found(),
        });
        let version = Inspector::new(client).check_operator_version().await.unwrap();
        assert_eq!(version, "v2.4.1");
    }

    #[tokio::test]
    async fn test_manager_version_needs_a_tag() {
        let (client, _) = mock_client(|req| match req.path.as_str() {
            DEPLOYMENTS => testing::ok(testing::list(
                "DeploymentList",
                "apps/v1",
                vec![testing::deployment(
                    "default",
                    OPERATOR_DEPLOYMENT_NAME,
                    &[("manager", "registry:5000/core-operator")],
                )],
            )),
            _ => testing::not_found(),
        });
        let err = Inspector::new(client)
            .check_operator_version()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }
}
