//! Cluster connection and kubeconfig helpers

use crate::utils::errors::{Error, Result};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};

/// Namespace used when neither a flag nor the kubeconfig context names one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Information retrieved from the running cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub namespace: String,
    pub platform: String,
    pub version: String,
}

/// Build a client from the kubeconfig, optionally for a specific context.
/// Falls back to in-cluster configuration when no context is requested.
pub async fn connect(context: Option<&str>) -> Result<Client> {
    let client = match context {
        Some(ctx) => {
            let options = KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            };
            let config = kube::Config::from_kubeconfig(&options).await?;
            Client::try_from(config)?
        }
        None => Client::try_default().await?,
    };
    Ok(client)
}

/// Namespace configured on the kubeconfig's current context, if any
pub fn current_context_namespace() -> Result<Option<String>> {
    let kubeconfig = Kubeconfig::read()?;
    context_namespace(&kubeconfig)
}

fn context_namespace(kubeconfig: &Kubeconfig) -> Result<Option<String>> {
    let current = kubeconfig
        .current_context
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(Error::NoContext)?;

    let named = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == current)
        .ok_or(Error::NoContext)?;

    Ok(named
        .context
        .as_ref()
        .and_then(|c| c.namespace.clone())
        .filter(|ns| !ns.is_empty()))
}

/// Pick the namespace to operate in.
/// Priority: explicit flag > settings > kubeconfig context > `default`.
pub fn resolve_namespace(flag: Option<&str>, configured: Option<&str>) -> Result<String> {
    if let Some(ns) = flag.or(configured).filter(|ns| !ns.is_empty()) {
        return Ok(ns.to_string());
    }

    match current_context_namespace() {
        Ok(Some(ns)) => Ok(ns),
        Ok(None) => Ok(DEFAULT_NAMESPACE.to_string()),
        Err(Error::NoContext) => {
            crate::log_warn!("No context is currently set. Using default namespace.");
            Ok(DEFAULT_NAMESPACE.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Query the API server version and platform
pub async fn cluster_info(client: &Client, namespace: &str) -> Result<ClusterInfo> {
    let info = client.apiserver_version().await?;
    Ok(ClusterInfo {
        namespace: namespace.to_string(),
        platform: info.platform,
        version: info.git_version,
    })
}
