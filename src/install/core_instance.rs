//! Core instance deploy, update and delete

use crate::config::CoreInstance;
use crate::k8s::cleanup::{self, ResourceRollBack};
use crate::k8s::labels::core_instance_selector;
use crate::k8s::resources::{
    ClusterRoleOptions, DeploymentOptions, Orchestrator, SyncDeploymentOptions,
};
use crate::k8s::rollout::RolloutUpdater;
use crate::k8s::wait::ReadinessWaiter;
use crate::utils::dryrun::DryRunReport;
use crate::utils::errors::Result;
use kube::Client;
use serde::Serialize;
use std::time::Duration;

/// Which workload a core instance runs
#[derive(Debug, Clone)]
pub enum Workload {
    /// Single core container talking to the cloud directly
    Standalone(DeploymentOptions),
    /// Sync containers next to an operator-managed core
    Sync(SyncDeploymentOptions),
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub workload: Workload,
    pub cluster_role: ClusterRoleOptions,
    pub wait: bool,
    pub verbose: bool,
    pub timeout: Duration,
    pub dry_run: bool,
}

/// What a deploy produced
#[derive(Debug, Default)]
pub struct Deployed {
    pub deployment: String,
    pub namespace_created: bool,
    /// Objects that would have been created, only filled in dry-run mode
    pub report: DryRunReport,
}

/// Deploys one core instance through an [`Orchestrator`]
pub struct CoreInstanceDeployer<'a> {
    orchestrator: &'a Orchestrator,
    waiter: ReadinessWaiter,
}

impl<'a> CoreInstanceDeployer<'a> {
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self {
            waiter: ReadinessWaiter::new(orchestrator.client().clone()),
            orchestrator,
        }
    }

    pub fn with_waiter(mut self, waiter: ReadinessWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Create the instance objects in dependency order.
    ///
    /// Every object persisted is appended to `created`, so a caller can hand
    /// the list to [`cleanup::delete_resources`] when a later step fails.
    pub async fn deploy(
        &self,
        instance: &CoreInstance,
        options: &DeployOptions,
        created: &mut Vec<ResourceRollBack>,
    ) -> Result<Deployed> {
        let dry_run = options.dry_run;
        let orchestrator = self.orchestrator;
        let mut deployed = Deployed::default();

        if !dry_run {
            deployed.namespace_created = orchestrator.ensure_own_namespace().await?;
        }

        let secret = match options.workload {
            Workload::Sync(_) => {
                orchestrator
                    .create_secret_operator_rsa_key(instance, dry_run)
                    .await?
            }
            Workload::Standalone(_) => orchestrator.create_secret(instance, dry_run).await?,
        };
        record(&secret, dry_run, &mut deployed.report, created)?;

        let account = orchestrator
            .create_service_account(instance, dry_run)
            .await?;
        record(&account, dry_run, &mut deployed.report, created)?;

        let role = orchestrator
            .create_cluster_role(instance, dry_run, options.cluster_role)
            .await?;
        record(&role, dry_run, &mut deployed.report, created)?;

        let binding = orchestrator
            .create_cluster_role_binding(instance, &role, &account, dry_run)
            .await?;
        record(&binding, dry_run, &mut deployed.report, created)?;

        let deployment = match &options.workload {
            Workload::Standalone(opts) => {
                orchestrator
                    .create_deployment(instance, &account, opts, dry_run)
                    .await?
            }
            Workload::Sync(opts) => {
                let account_name = account.metadata.name.clone().unwrap_or_default();
                orchestrator
                    .create_sync_deployment(instance, &account_name, opts, dry_run)
                    .await?
            }
        };
        record(&deployment, dry_run, &mut deployed.report, created)?;
        deployed.deployment = deployment.metadata.name.clone().unwrap_or_default();

        if options.wait && !dry_run {
            self.waiter
                .wait_ready(
                    orchestrator.namespace(),
                    &deployed.deployment,
                    options.verbose,
                    options.timeout,
                )
                .await?;
        }
        Ok(deployed)
    }
}

fn record<K>(
    object: &K,
    dry_run: bool,
    report: &mut DryRunReport,
    created: &mut Vec<ResourceRollBack>,
) -> Result<()>
where
    K: kube::Resource<DynamicType = ()> + Serialize,
{
    if dry_run {
        return report.push(object);
    }
    let reference = ResourceRollBack::from_object(object);
    crate::log_info!("Created {}", reference);
    created.push(reference);
    Ok(())
}

/// New image for a running core instance
#[derive(Debug, Clone)]
pub enum ImageUpdate {
    /// Full image reference for the standalone core container
    Core(String),
    /// Tag applied to both sync containers, keeping their repositories
    SyncTag(String),
}

/// Roll the instance deployment in `namespace` to a new image and wait for it
pub async fn update(
    client: &Client,
    namespace: &str,
    instance_name: &str,
    image: &ImageUpdate,
    tls_verify: bool,
    verbose: bool,
    timeout: Duration,
) -> Result<()> {
    update_with(
        RolloutUpdater::new(client.clone(), namespace),
        instance_name,
        image,
        tls_verify,
        verbose,
        timeout,
    )
    .await
}

pub async fn update_with(
    updater: RolloutUpdater,
    instance_name: &str,
    image: &ImageUpdate,
    tls_verify: bool,
    verbose: bool,
    timeout: Duration,
) -> Result<()> {
    let selector = core_instance_selector(instance_name);
    match image {
        ImageUpdate::Core(image) => {
            updater
                .update_and_wait(&selector, image, tls_verify, verbose, timeout)
                .await
        }
        ImageUpdate::SyncTag(tag) => {
            updater
                .update_sync_and_wait(&selector, tag, tls_verify, verbose, timeout)
                .await
        }
    }
}

/// Remove everything a core instance owns.
///
/// The deterministic object names go first, in every namespace. Objects
/// carrying the instance label in `namespace` follow, then the services the
/// operator created for the instance.
pub async fn delete(
    client: &Client,
    namespace: &str,
    name_prefix: &str,
    instance: &CoreInstance,
    wait: bool,
) -> Result<()> {
    cleanup::delete_core_instance(
        client,
        name_prefix,
        &instance.name,
        &instance.environment_name,
        wait,
    )
    .await?;

    let selector = core_instance_selector(&instance.name);
    cleanup::delete_by_label(client, namespace, &selector).await?;

    for service in cleanup::find_services_by_label(client, namespace, &selector).await? {
        cleanup::delete_service_by_name(client, namespace, &service).await?;
        crate::log_debug!("Deleted service {}/{}", namespace, service);
    }
    Ok(())
}
