//! Install, update and removal flows for the core operator and core instances

pub mod core_instance;
pub mod manifest;
pub mod operator;
pub mod version;

pub use manifest::{ManifestPreparer, PreparedManifest};
pub use operator::{InstallOutcome, OperatorLifecycle, OperatorOptions};
pub use version::{GithubReleases, VersionResolver, VersionTag};
