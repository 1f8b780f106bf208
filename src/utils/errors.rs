//! Error types for cluster lifecycle operations, with actionable suggestions

use colored::Colorize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while preparing, applying, inspecting or rolling out resources
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The requested version is not a semantic version
    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },

    /// The version is well formed but no release carries that tag
    #[error("core-operator image tag {0} is not available")]
    VersionNotAvailable(String),

    /// The release registry could not be queried or returned unusable data
    #[error("release registry error: {0}")]
    Registry(String),

    /// The base manifest does not contain the operator image reference
    #[error("could not find image in manifest")]
    ImageNotFoundInManifest,

    /// The manifest could not be interpreted
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// No deployment matched a label selector
    #[error("no deployment found with label {0}")]
    NoDeploymentFound(String),

    /// More than one deployment matched a selector meant to identify one
    #[error("label {selector} matches {} deployments ({}), refusing to update", .names.len(), .names.join(", "))]
    AmbiguousSelector { selector: String, names: Vec<String> },

    /// A deployment selector the client cannot express as a label query
    #[error("invalid label selector on {0}")]
    InvalidSelector(String),

    /// The deployment has an empty pod template
    #[error("no containers found in deployment {0}")]
    NoContainers(String),

    /// An image reference without a tag
    #[error("could not parse version from manager image: {0}")]
    InvalidImage(String),

    /// The operator manager deployment is absent from every namespace
    #[error("could not find core operator across all namespaces")]
    OperatorNotFound,

    /// Residue of a previous operator install, one entry per object found
    #[error("{}", .0.join("\n"))]
    OperatorIncomplete(Vec<String>),

    /// Pods did not reach the running phase in time
    #[error("timed out after {timeout:?} waiting for deployment {namespace}/{name} to be ready")]
    WaitTimeout {
        namespace: String,
        name: String,
        timeout: Duration,
    },

    /// Pods did not reach the running phase in time; waiting messages per pod
    #[error("failed while waiting for deployment to start:\n{}", format_pod_messages(.0))]
    PodsNotReady(BTreeMap<String, String>),

    /// The kubeconfig has no current context
    #[error("no context is currently set")]
    NoContext,

    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be read
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_pod_messages(messages: &BTreeMap<String, String>) -> String {
    messages
        .iter()
        .map(|(pod, message)| format!("* pod {}, Message: {}\n", pod, message))
        .collect()
}

/// True when a kube error is an API 404
pub fn is_api_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

impl Error {
    /// Whether this error means "the thing is absent" rather than "something broke"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::OperatorNotFound | Error::NoDeploymentFound(_) => true,
            Error::Kube(e) => is_api_not_found(e),
            _ => false,
        }
    }

    /// Actionable hints for the user
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Error::InvalidVersion { .. } => vec![
                "Versions look like 1.2.3 or v1.2.3".to_string(),
                "Leave --version empty to install the default release".to_string(),
            ],
            Error::VersionNotAvailable(_) => vec![
                "List published releases at https://github.com/calyptia/core-operator-releases/releases"
                    .to_string(),
            ],
            Error::Registry(_) => vec![
                "Check network connectivity to api.github.com".to_string(),
                "Set HTTPS_PROXY if you are behind a proxy".to_string(),
            ],
            Error::OperatorNotFound => vec![
                "Install the operator first: corectl operator install".to_string(),
            ],
            Error::OperatorIncomplete(_) => vec![
                "Remove the leftovers with: corectl operator uninstall".to_string(),
                "Or rerun with --yes to install over them".to_string(),
            ],
            Error::AmbiguousSelector { .. } => vec![
                "Narrow the label selector so it matches a single deployment".to_string(),
            ],
            Error::WaitTimeout { namespace, .. } => vec![
                format!("Check pod status: kubectl get pods -n {}", namespace),
                "Increase the timeout with --timeout".to_string(),
                "Rerun with --verbose to collect pod messages".to_string(),
            ],
            Error::PodsNotReady(_) => vec!["Increase the timeout with --timeout".to_string()],
            Error::NoContext => vec![
                "Select a context with: kubectl config use-context <name>".to_string(),
            ],
            Error::Kube(kube::Error::Api(e)) if e.code == 401 || e.code == 403 => vec![
                "Verify you have sufficient cluster permissions".to_string(),
                "Cluster roles are created, so cluster-admin is usually required".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    /// Print the error and its suggestions
    pub fn display(&self) {
        crate::log_debug!("{:?}", self);
        eprintln!("{} {}", "error:".red().bold(), self);

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            eprintln!();
            eprintln!("{}", "Suggestions:".yellow().bold());
            for suggestion in suggestions {
                eprintln!("  {} {}", "→".blue(), suggestion);
            }
        }
    }
}
