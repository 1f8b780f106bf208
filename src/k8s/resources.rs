//! Creation of the cluster objects backing a core instance
//!
//! Every `create_*` takes a `dry_run` flag. In dry-run mode the fully
//! populated object is returned without talking to the API server, so the
//! caller can render it.

use crate::config::CoreInstance;
use crate::k8s::labels::core_instance_labels;
use crate::utils::errors::{Result, is_api_not_found};
use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, Namespace, ObjectFieldSelector, PodSpec, PodTemplateSpec,
    Secret, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::Client;
use kube::api::{Api, PostParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CORE_TLS_VERIFY_ENV: &str = "CORE_TLS_VERIFY";
pub const SYNC_TLS_VERIFY_ENV: &str = "NO_TLS_VERIFY";
pub const SKIP_SERVICE_CREATION_ENV: &str = "CORE_INSTANCE_SKIP_SERVICE_CREATION";

/// Key holding the operator's RSA key in the instance secret
pub const PRIVATE_KEY_DATA_KEY: &str = "private-key";

const SYNC_INTERVAL: &str = "15s";
const PULL_ALWAYS: &str = "Always";

const CORE_API_GROUPS: &[&str] = &["", "apps", "batch", "policy", "core.calyptia.com"];
const CORE_RESOURCES: &[&str] = &[
    "namespaces",
    "deployments",
    "daemonsets",
    "replicasets",
    "pods",
    "services",
    "configmaps",
    "deployments/scale",
    "secrets",
    "nodes/proxy",
    "nodes",
    "jobs",
    "podsecuritypolicies",
    "ingestchecks",
    "ingestchecks/finalizers",
    "ingestchecks/status",
    "pipelines",
    "pipelines/finalizers",
    "pipelines/status",
];
const CORE_VERBS: &[&str] = &[
    "get",
    "list",
    "create",
    "delete",
    "patch",
    "update",
    "watch",
    "deletecollection",
    "use",
];

/// Tunables for created objects. Loaded from the `[orchestrator]` settings table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    #[serde(default = "default_automount")]
    pub automount_service_account_token: bool,

    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_replicas() -> i32 {
    1
}

fn default_automount() -> bool {
    true
}

fn default_name_prefix() -> String {
    "calyptia".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            automount_service_account_token: default_automount(),
            name_prefix: default_name_prefix(),
        }
    }
}

/// Kind of object owned by a core instance; the suffix is part of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Deployment,
    DaemonSet,
    ClusterRole,
    ClusterRoleBinding,
    ServiceAccount,
    Secret,
    ConfigMap,
}

impl ResourceKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::ClusterRole => "cluster-role",
            ResourceKind::ClusterRoleBinding => "cluster-role-binding",
            ResourceKind::ServiceAccount => "service-account",
            ResourceKind::Secret => "secret",
            ResourceKind::ConfigMap => "configmap",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Join `parts` with `-` and prepend `prefix-` unless the result already starts with `prefix`
pub fn format_resource_name(prefix: &str, parts: &[&str]) -> String {
    let name = parts.join("-");
    if prefix.is_empty() || name.starts_with(prefix) {
        name
    } else {
        format!("{}-{}", prefix, name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterRoleOptions {
    pub enable_openshift: bool,
}

/// Inputs of the legacy core deployment
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    pub image: String,
    pub cloud_url: String,
    pub tls_verify: bool,
    pub skip_service_creation: bool,
}

/// Inputs of the operator-managed sync deployment
#[derive(Debug, Clone, Default)]
pub struct SyncDeploymentOptions {
    pub cloud_url: String,
    pub to_cloud_image: String,
    pub from_cloud_image: String,
    pub metrics_port: String,
    pub no_tls_verify: bool,
    pub http_proxy: String,
    pub https_proxy: String,
}

/// Creates the objects of a core instance in one namespace
#[derive(Clone)]
pub struct Orchestrator {
    client: Client,
    namespace: String,
    project_token: String,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        project_token: impl Into<String>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            project_token: project_token.into(),
            config,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Deterministic object name: `<prefix>-<instance>-<environment>-<kind>`
    pub fn resource_name(&self, instance: &CoreInstance, kind: ResourceKind) -> String {
        format_resource_name(
            &self.config.name_prefix,
            &[&instance.name, &instance.environment_name, kind.suffix()],
        )
    }

    /// Name of the operator-managed sync deployment
    pub fn sync_deployment_name(&self, instance: &CoreInstance) -> String {
        format_resource_name(
            &self.config.name_prefix,
            &[&instance.name, &instance.environment_name, "sync"],
        )
    }

    fn object_meta(&self, instance: &CoreInstance, kind: ResourceKind) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.resource_name(instance, kind)),
            labels: Some(core_instance_labels(instance)),
            ..Default::default()
        }
    }

    fn namespaced_meta(&self, instance: &CoreInstance, kind: ResourceKind) -> ObjectMeta {
        ObjectMeta {
            namespace: Some(self.namespace.clone()),
            ..self.object_meta(instance, kind)
        }
    }

    /// Create the target namespace when it does not exist yet.
    /// Returns true when it was created.
    pub async fn ensure_own_namespace(&self) -> Result<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(&self.namespace).await {
            Ok(_) => return Ok(false),
            Err(e) if is_api_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.create(&PostParams::default(), &namespace).await?;
        crate::log_info!("Created namespace {}", self.namespace);
        Ok(true)
    }

    /// Secret holding the instance key under the secret's own name
    pub async fn create_secret(&self, instance: &CoreInstance, dry_run: bool) -> Result<Secret> {
        let metadata = self.namespaced_meta(instance, ResourceKind::Secret);
        let key = metadata.name.clone().unwrap_or_default();
        self.post_secret(metadata, key, instance, dry_run).await
    }

    /// Secret holding the instance key under `private-key`, as read by the operator
    pub async fn create_secret_operator_rsa_key(
        &self,
        instance: &CoreInstance,
        dry_run: bool,
    ) -> Result<Secret> {
        let metadata = self.namespaced_meta(instance, ResourceKind::Secret);
        self.post_secret(metadata, PRIVATE_KEY_DATA_KEY.to_string(), instance, dry_run)
            .await
    }

    async fn post_secret(
        &self,
        metadata: ObjectMeta,
        key: String,
        instance: &CoreInstance,
        dry_run: bool,
    ) -> Result<Secret> {
        let mut data = BTreeMap::new();
        data.insert(key, ByteString(instance.private_rsa_key.clone()));
        let secret = Secret {
            metadata,
            data: Some(data),
            ..Default::default()
        };

        if dry_run {
            return Ok(secret);
        }
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.create(&PostParams::default(), &secret).await?)
    }

    pub async fn create_service_account(
        &self,
        instance: &CoreInstance,
        dry_run: bool,
    ) -> Result<ServiceAccount> {
        let account = ServiceAccount {
            metadata: self.namespaced_meta(instance, ResourceKind::ServiceAccount),
            ..Default::default()
        };

        if dry_run {
            return Ok(account);
        }
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.create(&PostParams::default(), &account).await?)
    }

    pub async fn create_cluster_role(
        &self,
        instance: &CoreInstance,
        dry_run: bool,
        options: ClusterRoleOptions,
    ) -> Result<ClusterRole> {
        let mut api_groups: Vec<String> = CORE_API_GROUPS.iter().map(|s| s.to_string()).collect();
        let mut resources: Vec<String> = CORE_RESOURCES.iter().map(|s| s.to_string()).collect();
        if options.enable_openshift {
            api_groups.push("security.openshift.io".to_string());
            resources.push("securitycontextconstraints".to_string());
        }

        let role = ClusterRole {
            metadata: self.object_meta(instance, ResourceKind::ClusterRole),
            rules: Some(vec![PolicyRule {
                api_groups: Some(api_groups),
                resources: Some(resources),
                verbs: CORE_VERBS.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        if dry_run {
            return Ok(role);
        }
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), &role).await?)
    }

    /// Bind `role` to `account` in the orchestrator's namespace
    pub async fn create_cluster_role_binding(
        &self,
        instance: &CoreInstance,
        role: &ClusterRole,
        account: &ServiceAccount,
        dry_run: bool,
    ) -> Result<ClusterRoleBinding> {
        let binding = ClusterRoleBinding {
            metadata: self.object_meta(instance, ResourceKind::ClusterRoleBinding),
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: role.metadata.name.clone().unwrap_or_default(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: account.metadata.name.clone().unwrap_or_default(),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            }]),
            ..Default::default()
        };

        if dry_run {
            return Ok(binding);
        }
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), &binding).await?)
    }

    /// The legacy core deployment: a single container talking to the cloud directly
    pub async fn create_deployment(
        &self,
        instance: &CoreInstance,
        account: &ServiceAccount,
        options: &DeploymentOptions,
        dry_run: bool,
    ) -> Result<Deployment> {
        let env = vec![
            env_var("AGGREGATOR_NAME", &instance.name),
            env_var("PROJECT_TOKEN", &self.project_token),
            env_var("AGGREGATOR_FLUENTBIT_CLOUD_URL", &options.cloud_url),
            env_var(CORE_TLS_VERIFY_ENV, &options.tls_verify.to_string()),
            env_var(
                SKIP_SERVICE_CREATION_ENV,
                &options.skip_service_creation.to_string(),
            ),
            env_var("POD_NAMESPACE", &self.namespace),
            EnvVar {
                name: "DEPLOYMENT_NAME".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.name".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];

        let container = Container {
            name: instance.name.clone(),
            image: Some(options.image.clone()),
            image_pull_policy: Some(PULL_ALWAYS.to_string()),
            args: Some(vec!["-debug=true".to_string()]),
            env: Some(env),
            ..Default::default()
        };

        let deployment = self.deployment(
            self.namespaced_meta(instance, ResourceKind::Deployment),
            instance,
            account.metadata.name.clone(),
            vec![container],
        );

        if dry_run {
            return Ok(deployment);
        }
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.create(&PostParams::default(), &deployment).await?)
    }

    /// The operator-managed sync deployment with its to-cloud and from-cloud containers
    pub async fn create_sync_deployment(
        &self,
        instance: &CoreInstance,
        service_account: &str,
        options: &SyncDeploymentOptions,
        dry_run: bool,
    ) -> Result<Deployment> {
        let env = vec![
            env_var("CORE_INSTANCE", &instance.name),
            env_var("NAMESPACE", &self.namespace),
            env_var("CLOUD_URL", &options.cloud_url),
            env_var("TOKEN", &self.project_token),
            env_var("INTERVAL", SYNC_INTERVAL),
            env_var(SYNC_TLS_VERIFY_ENV, &options.no_tls_verify.to_string()),
            env_var("METRICS_PORT", &options.metrics_port),
            env_var("HTTP_PROXY", &options.http_proxy),
            env_var("HTTPS_PROXY", &options.https_proxy),
        ];

        let sync_container = |suffix: &str, image: &str| Container {
            name: format!("{}-{}", instance.name, suffix),
            image: Some(image.to_string()),
            image_pull_policy: Some(PULL_ALWAYS.to_string()),
            env: Some(env.clone()),
            ..Default::default()
        };
        let containers = vec![
            sync_container("sync-from-cloud", &options.from_cloud_image),
            sync_container("sync-to-cloud", &options.to_cloud_image),
        ];

        let metadata = ObjectMeta {
            name: Some(self.sync_deployment_name(instance)),
            namespace: Some(self.namespace.clone()),
            labels: Some(core_instance_labels(instance)),
            ..Default::default()
        };
        let deployment = self.deployment(
            metadata,
            instance,
            Some(service_account.to_string()),
            containers,
        );

        if dry_run {
            return Ok(deployment);
        }
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.create(&PostParams::default(), &deployment).await?)
    }

    fn deployment(
        &self,
        metadata: ObjectMeta,
        instance: &CoreInstance,
        service_account: Option<String>,
        containers: Vec<Container>,
    ) -> Deployment {
        let labels = core_instance_labels(instance);
        Deployment {
            metadata,
            spec: Some(DeploymentSpec {
                replicas: Some(self.config.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: service_account,
                        automount_service_account_token: Some(
                            self.config.automount_service_account_token,
                        ),
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::labels::LABEL_CORE_INSTANCE_NAME;
    use crate::k8s::testing::{self, mock_client};
    use http::{Method, StatusCode};

    fn instance() -> CoreInstance {
        CoreInstance::builder()
            .name("edge")
            .environment("prod")
            .private_rsa_key(b"---KEY---".to_vec())
            .build()
            .unwrap()
    }

    fn offline_orchestrator() -> Orchestrator {
        // dry-run paths never reach the mock, any request would be recorded
        let (client, _) = mock_client(|_| testing::not_found());
        Orchestrator::new(client, "observability", "tok-123", OrchestratorConfig::default())
    }

    fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
        container
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn test_format_resource_name_never_double_prefixes() {
        assert_eq!(
            format_resource_name("calyptia", &["edge", "prod", "secret"]),
            "calyptia-edge-prod-secret"
        );
        assert_eq!(
            format_resource_name("calyptia", &["calyptia-edge", "prod", "sync"]),
            "calyptia-edge-prod-sync"
        );
        assert_eq!(format_resource_name("", &["a", "b"]), "a-b");
    }

    #[tokio::test]
    async fn test_dry_run_secret_variants() {
        let orchestrator = offline_orchestrator();
        let secret = orchestrator.create_secret(&instance(), true).await.unwrap();
        assert_eq!(
            secret.metadata.name.as_deref(),
            Some("calyptia-edge-prod-secret")
        );
        let data = secret.data.unwrap();
        assert_eq!(data["calyptia-edge-prod-secret"].0, b"---KEY---");

        let secret = orchestrator
            .create_secret_operator_rsa_key(&instance(), true)
            .await
            .unwrap();
        assert!(secret.data.unwrap().contains_key(PRIVATE_KEY_DATA_KEY));
    }

    #[tokio::test]
    async fn test_dry_run_cluster_role_openshift_rules() {
        let orchestrator = offline_orchestrator();
        let role = orchestrator
            .create_cluster_role(&instance(), true, ClusterRoleOptions::default())
            .await
            .unwrap();
        let rule = &role.rules.unwrap()[0];
        assert!(!rule.api_groups.as_ref().unwrap().contains(&"security.openshift.io".to_string()));
        assert!(rule.verbs.contains(&"deletecollection".to_string()));

        let role = orchestrator
            .create_cluster_role(
                &instance(),
                true,
                ClusterRoleOptions {
                    enable_openshift: true,
                },
            )
            .await
            .unwrap();
        let rule = &role.rules.unwrap()[0];
        assert!(rule.api_groups.as_ref().unwrap().contains(&"security.openshift.io".to_string()));
        assert!(
            rule.resources
                .as_ref()
                .unwrap()
                .contains(&"securitycontextconstraints".to_string())
        );
    }

    #[tokio::test]
    async fn test_dry_run_binding_links_role_and_account() {
        let orchestrator = offline_orchestrator();
        let role = orchestrator
            .create_cluster_role(&instance(), true, ClusterRoleOptions::default())
            .await
            .unwrap();
        let account = orchestrator
            .create_service_account(&instance(), true)
            .await
            .unwrap();
        let binding = orchestrator
            .create_cluster_role_binding(&instance(), &role, &account, true)
            .await
            .unwrap();

        assert_eq!(binding.role_ref.name, "calyptia-edge-prod-cluster-role");
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.name, "calyptia-edge-prod-service-account");
        assert_eq!(subject.namespace.as_deref(), Some("observability"));
    }

    #[tokio::test]
    async fn test_dry_run_deployment_env_and_labels() {
        let orchestrator = offline_orchestrator();
        let account = orchestrator
            .create_service_account(&instance(), true)
            .await
            .unwrap();
        let options = DeploymentOptions {
            image: "ghcr.io/calyptia/core:v1.0.0".to_string(),
            cloud_url: "https://cloud.example".to_string(),
            tls_verify: false,
            skip_service_creation: true,
        };
        let deployment = orchestrator
            .create_deployment(&instance(), &account, &options, true)
            .await
            .unwrap();

        assert_eq!(
            deployment.metadata.labels.as_ref().unwrap()[LABEL_CORE_INSTANCE_NAME],
            "edge"
        );
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let pod = spec.template.spec.unwrap();
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some("calyptia-edge-prod-service-account")
        );
        let container = &pod.containers[0];
        assert_eq!(env_value(container, "PROJECT_TOKEN"), Some("tok-123"));
        assert_eq!(env_value(container, CORE_TLS_VERIFY_ENV), Some("false"));
        assert_eq!(env_value(container, SKIP_SERVICE_CREATION_ENV), Some("true"));
        assert_eq!(env_value(container, "POD_NAMESPACE"), Some("observability"));
        let downward = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|e| e.name == "DEPLOYMENT_NAME")
            .unwrap();
        assert_eq!(
            downward.value_from.as_ref().unwrap().field_ref.as_ref().unwrap().field_path,
            "metadata.name"
        );
    }

    #[tokio::test]
    async fn test_dry_run_sync_deployment_containers() {
        let orchestrator = offline_orchestrator();
        let options = SyncDeploymentOptions {
            cloud_url: "https://cloud.example".to_string(),
            to_cloud_image: "repo/to:v1".to_string(),
            from_cloud_image: "repo/from:v1".to_string(),
            metrics_port: "15334".to_string(),
            no_tls_verify: true,
            ..Default::default()
        };
        let deployment = orchestrator
            .create_sync_deployment(&instance(), "sa", &options, true)
            .await
            .unwrap();

        assert_eq!(
            deployment.metadata.name.as_deref(),
            Some("calyptia-edge-prod-sync")
        );
        let containers = deployment.spec.unwrap().template.spec.unwrap().containers;
        let names: Vec<_> = containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["edge-sync-from-cloud", "edge-sync-to-cloud"]);
        assert_eq!(env_value(&containers[0], "INTERVAL"), Some("15s"));
        assert_eq!(env_value(&containers[1], SYNC_TLS_VERIFY_ENV), Some("true"));
        assert_eq!(env_value(&containers[1], "TOKEN"), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_config_knobs_flow_into_objects() {
        let (client, _) = mock_client(|_| testing::not_found());
        let config = OrchestratorConfig {
            replicas: 3,
            automount_service_account_token: false,
            name_prefix: "acme".to_string(),
        };
        let orchestrator = Orchestrator::new(client, "ns", "tok", config);
        let account = orchestrator
            .create_service_account(&instance(), true)
            .await
            .unwrap();
        assert_eq!(
            account.metadata.name.as_deref(),
            Some("acme-edge-prod-service-account")
        );

        let options = DeploymentOptions {
            image: "img:v1".to_string(),
            cloud_url: String::new(),
            tls_verify: true,
            skip_service_creation: false,
        };
        let spec = orchestrator
            .create_deployment(&instance(), &account, &options, true)
            .await
            .unwrap()
            .spec
            .unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(
            spec.template.spec.unwrap().automount_service_account_token,
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_create_secret_posts_to_namespace() {
        let (client, log) = mock_client(|req| match req.method {
            Method::POST => (StatusCode::CREATED, req.body.clone()),
            _ => testing::not_found(),
        });
        let orchestrator =
            Orchestrator::new(client, "observability", "tok", OrchestratorConfig::default());
        let secret = orchestrator.create_secret(&instance(), false).await.unwrap();
        assert_eq!(
            secret.metadata.namespace.as_deref(),
            Some("observability")
        );

        let requests = log.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/api/v1/namespaces/observability/secrets");
    }

    #[tokio::test]
    async fn test_ensure_own_namespace_creates_when_missing() {
        let (client, log) = mock_client(|req| match req.method {
            Method::GET => testing::not_found(),
            _ => (StatusCode::CREATED, req.body.clone()),
        });
        let orchestrator =
            Orchestrator::new(client, "fresh", "tok", OrchestratorConfig::default());
        assert!(orchestrator.ensure_own_namespace().await.unwrap());

        let requests = log.lock().unwrap();
        assert_eq!(requests[0].path, "/api/v1/namespaces/fresh");
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "/api/v1/namespaces");
    }

    #[tokio::test]
    async fn test_ensure_own_namespace_keeps_existing() {
        let (client, log) = mock_client(|_| testing::ok(testing::namespace("present")));
        let orchestrator =
            Orchestrator::new(client, "present", "tok", OrchestratorConfig::default());
        assert!(!orchestrator.ensure_own_namespace().await.unwrap());
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
