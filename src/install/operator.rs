//! Core operator install, update and uninstall

use crate::install::manifest::{LiteralTemplate, ManifestPreparer, ManifestTemplate};
use crate::install::version::VersionTag;
use crate::k8s::apply;
use crate::k8s::inspect::Inspector;
use crate::k8s::wait::ReadinessWaiter;
use crate::utils::errors::{Result, is_api_not_found};
use k8s_openapi::api::core::v1::Namespace;
use kube::Client;
use kube::api::Api;
use std::time::Duration;

/// What to install and how long to wait for it
#[derive(Debug, Clone)]
pub struct OperatorOptions {
    pub namespace: String,
    /// Image repository, without tag
    pub image: String,
    /// `None` keeps the tag shipped in the manifest
    pub version: Option<VersionTag>,
    pub wait: bool,
    pub verbose: bool,
    pub timeout: Duration,
    pub dry_run: bool,
}

/// Result of an install or update
#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    pub namespace: String,
    pub deployment: String,
    pub namespace_created: bool,
    /// `Kind/name` of every applied object
    pub applied: Vec<String>,
    /// Rendered manifest, only set in dry-run mode
    pub rendered: Option<String>,
}

/// Installs the operator manifest into a cluster
pub struct OperatorLifecycle<T = LiteralTemplate> {
    client: Client,
    preparer: ManifestPreparer<T>,
    waiter: ReadinessWaiter,
}

impl OperatorLifecycle<LiteralTemplate> {
    /// Lifecycle over the manifest embedded in the binary
    pub fn new(client: Client) -> Self {
        Self::with_preparer(client, ManifestPreparer::embedded())
    }
}

impl<T: ManifestTemplate> OperatorLifecycle<T> {
    pub fn with_preparer(client: Client, preparer: ManifestPreparer<T>) -> Self {
        Self {
            waiter: ReadinessWaiter::new(client.clone()),
            client,
            preparer,
        }
    }

    pub fn with_waiter(mut self, waiter: ReadinessWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(namespace).await {
            Ok(_) => Ok(true),
            Err(e) if is_api_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Render the manifest for the target namespace, apply it and optionally wait
    pub async fn install(&self, options: &OperatorOptions) -> Result<InstallOutcome> {
        let create_namespace = !self.namespace_exists(&options.namespace).await?;
        let prepared = self.preparer.prepare(
            &options.namespace,
            &options.image,
            options.version.as_ref().map(VersionTag::as_str),
            create_namespace,
        )?;
        let deployment = prepared.deployment_name()?;

        let mut outcome = InstallOutcome {
            namespace: options.namespace.clone(),
            deployment: deployment.clone(),
            namespace_created: create_namespace,
            ..Default::default()
        };

        if options.dry_run {
            outcome.rendered = Some(prepared.contents().to_string());
            return Ok(outcome);
        }

        crate::log_info!(
            "Applying operator manifest {} to namespace {}",
            prepared.path().display(),
            options.namespace
        );
        let applied = apply::apply_manifest(&self.client, prepared.contents()).await?;
        outcome.applied = applied.iter().map(ToString::to_string).collect();

        if options.wait {
            self.waiter
                .wait_ready(
                    &options.namespace,
                    &deployment,
                    options.verbose,
                    options.timeout,
                )
                .await?;
        }
        Ok(outcome)
    }

    /// Re-apply the manifest with a new image tag.
    /// Returns the version that was running before, if any.
    pub async fn update(
        &self,
        options: &OperatorOptions,
    ) -> Result<(Option<String>, InstallOutcome)> {
        let previous = match Inspector::new(self.client.clone())
            .check_operator_version()
            .await
        {
            Ok(version) => Some(version),
            Err(e) if e.is_not_found() => {
                crate::log_warn!("No running core operator found, installing it");
                None
            }
            Err(e) => return Err(e),
        };
        let outcome = self.install(options).await?;
        Ok((previous, outcome))
    }

    /// Delete every object of the manifest from `namespace`, newest first.
    /// Fails with `OperatorNotFound` when no manager is running anywhere.
    pub async fn uninstall(&self, namespace: &str, dry_run: bool) -> Result<Vec<String>> {
        let version = Inspector::new(self.client.clone())
            .check_operator_version()
            .await?;
        crate::log_info!("Uninstalling core operator {}", version);

        let prepared = self.preparer.prepare(namespace, "", None, false)?;
        if dry_run {
            return Ok(apply::parse_documents(prepared.contents())?
                .iter()
                .rev()
                .map(ToString::to_string)
                .collect());
        }

        let deleted = apply::delete_manifest(&self.client, prepared.contents()).await?;
        Ok(deleted.iter().map(ToString::to_string).collect())
    }
}
