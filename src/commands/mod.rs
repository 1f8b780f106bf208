//! Command implementations for the corectl CLI

pub mod core_instance;
pub mod operator;

use crate::config::settings::Settings;
use crate::install::version::{GithubReleases, VersionResolver};

/// Resolver over the releases endpoint configured in `settings`
pub(crate) fn release_resolver(
    settings: &Settings,
) -> anyhow::Result<VersionResolver<GithubReleases>> {
    let index = GithubReleases::new(&settings.registry.releases_url)?;
    Ok(VersionResolver::new(index))
}
