//! `corectl operator` command implementations

use anyhow::{Context, Result};
use colored::Colorize;
use std::time::{Duration, Instant};

use crate::config::settings::Settings;
use crate::install::manifest::ManifestPreparer;
use crate::install::operator::{OperatorLifecycle, OperatorOptions};
use crate::commands::release_resolver;
use crate::install::version::VersionTag;
use crate::k8s::client::{self, ClusterInfo};
use crate::k8s::inspect::{Inspector, OPERATOR_DEPLOYMENT_NAME};
use crate::utils::dryrun::{self, DryRunReport};
use crate::utils::{confirm, confirm_or_assume, progress};

/// Flags shared by install and update
pub struct OperatorArgs {
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub version: String,
    pub image: Option<String>,
    /// Use the manifest published with the release instead of the embedded one
    pub from_release: bool,
    pub wait: bool,
    pub timeout: Option<u64>,
    pub verbose: bool,
    pub yes: bool,
    pub dry_run: bool,
}

impl OperatorArgs {
    fn timeout(&self, settings: &Settings) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| settings.defaults.wait_timeout())
    }
}

async fn preparer(
    args: &OperatorArgs,
    settings: &Settings,
    version: Option<&VersionTag>,
) -> Result<ManifestPreparer> {
    if !args.from_release {
        return Ok(ManifestPreparer::embedded());
    }
    let manifest = release_resolver(settings)?
        .fetch_manifest(version)
        .await
        .context("Failed to download the release manifest")?;
    Ok(ManifestPreparer::from_base(manifest))
}

/// Install the core operator
pub async fn install(args: OperatorArgs, settings: &Settings) -> Result<()> {
    // Validate the version before anything touches the cluster
    let version = release_resolver(settings)?.resolve(&args.version).await?;
    let namespace =
        client::resolve_namespace(args.namespace.as_deref(), settings.defaults.namespace.as_deref())?;
    let kube = client::connect(args.context.as_deref()).await?;

    if !args.dry_run && !args.yes && settings.defaults.confirm_reinstall {
        let state = Inspector::new(kube.clone()).is_installed().await?;
        if state.is_installed() {
            eprintln!("{}", "Previous operator installation components found:".yellow());
            for finding in &state.found {
                eprintln!("  - {}", finding);
            }
            if !confirm("Are you sure you want to proceed?")? {
                crate::log_info!("Install cancelled");
                return Ok(());
            }
        }
    }

    let options = OperatorOptions {
        namespace: namespace.clone(),
        image: args
            .image
            .clone()
            .unwrap_or_else(|| settings.images.operator.clone()),
        version: version.clone(),
        wait: args.wait,
        verbose: args.verbose,
        timeout: args.timeout(settings),
        dry_run: args.dry_run,
    };

    let lifecycle =
        OperatorLifecycle::with_preparer(kube, preparer(&args, settings, version.as_ref()).await?);
    let start = Instant::now();
    let outcome = if args.wait && !args.dry_run {
        progress::with_spinner_result(
            "Waiting for core operator manager to be ready...",
            "Core operator manager is ready",
            lifecycle.install(&options),
        )
        .await?
    } else {
        lifecycle.install(&options).await?
    };

    if let Some(rendered) = outcome.rendered {
        let mut report = DryRunReport::new();
        report.push_manifest(&rendered);
        report.print();
        return Ok(());
    }

    if outcome.namespace_created {
        crate::log_info!("Created namespace {}", outcome.namespace);
    }
    if args.wait {
        println!("Took {:.1?}", start.elapsed());
    }
    println!(
        "{} Core operator manager successfully installed in namespace {}",
        "✓".green(),
        outcome.namespace
    );
    Ok(())
}

/// Update the core operator to a new version. With no version, the default tag is applied.
pub async fn update(args: OperatorArgs, settings: &Settings) -> Result<()> {
    let version = match release_resolver(settings)?.resolve(&args.version).await? {
        Some(version) => version,
        None => VersionTag::parse(&settings.images.operator_tag)
            .context("Invalid operator tag in settings")?,
    };
    let namespace =
        client::resolve_namespace(args.namespace.as_deref(), settings.defaults.namespace.as_deref())?;
    let kube = client::connect(args.context.as_deref()).await?;

    let options = OperatorOptions {
        namespace,
        image: args
            .image
            .clone()
            .unwrap_or_else(|| settings.images.operator.clone()),
        version: Some(version.clone()),
        wait: args.wait,
        verbose: args.verbose,
        timeout: args.timeout(settings),
        dry_run: args.dry_run,
    };

    let lifecycle =
        OperatorLifecycle::with_preparer(kube, preparer(&args, settings, Some(&version)).await?);
    let (previous, outcome) = lifecycle.update(&options).await?;

    if let Some(rendered) = outcome.rendered {
        let mut report = DryRunReport::new();
        report.push_manifest(&rendered);
        report.print();
        return Ok(());
    }

    match previous {
        Some(previous) => println!(
            "{} Core operator updated from {} to {}",
            "✓".green(),
            previous,
            version
        ),
        None => println!("{} Core operator {} installed", "✓".green(), version),
    }
    Ok(())
}

/// Remove the core operator from a namespace
pub async fn uninstall(
    context: Option<String>,
    namespace: Option<String>,
    yes: bool,
    dry_run: bool,
    settings: &Settings,
) -> Result<()> {
    let namespace =
        client::resolve_namespace(namespace.as_deref(), settings.defaults.namespace.as_deref())?;
    let kube = client::connect(context.as_deref()).await?;

    if !dry_run
        && !confirm_or_assume(
            &format!("Remove the core operator from namespace {}?", namespace),
            yes,
        )?
    {
        crate::log_info!("Uninstall cancelled");
        return Ok(());
    }

    let removed = OperatorLifecycle::new(kube)
        .uninstall(&namespace, dry_run)
        .await?;

    if dry_run {
        for object in &removed {
            dryrun::log_action(&format!("Would delete {}", object));
        }
        return Ok(());
    }
    println!(
        "{} Core operator removed from namespace {} ({} objects)",
        "✓".green(),
        namespace,
        removed.len()
    );
    Ok(())
}

/// Show where the operator runs and which version
pub async fn status(context: Option<String>, namespace: Option<String>, settings: &Settings) -> Result<()> {
    let namespace =
        client::resolve_namespace(namespace.as_deref(), settings.defaults.namespace.as_deref())?;
    let kube = client::connect(context.as_deref()).await?;

    let ClusterInfo {
        platform, version, ..
    } = client::cluster_info(&kube, &namespace).await?;
    println!("Cluster:   {} ({})", version, platform);

    let inspector = Inspector::new(kube);
    match inspector.search_manager_across_namespaces().await {
        Ok(manager) => {
            let found_in = manager.metadata.namespace.clone().unwrap_or_default();
            let tag = crate::k8s::inspect::manager_version(&manager)?;
            println!("Operator:  {} in namespace {}", OPERATOR_DEPLOYMENT_NAME, found_in);
            println!("Version:   {}", tag);
        }
        Err(e) if e.is_not_found() => {
            println!("Operator:  {}", "not installed".yellow());
        }
        Err(e) => return Err(e.into()),
    }

    let state = inspector.is_installed().await?;
    if state.is_installed() {
        println!("Components:");
        for finding in &state.found {
            println!("  - {}", finding);
        }
    }
    Ok(())
}
