//! Operator version validation against the published releases

use crate::utils::errors::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const DEFAULT_RELEASES_URL: &str =
    "https://api.github.com/repos/calyptia/core-operator-releases/releases";

static SEMVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v[0-9]+(\.[0-9]+){0,2}(-[0-9A-Za-z\-~]+(\.[0-9A-Za-z\-~]+)*)?(\+[0-9A-Za-z\-~]+(\.[0-9A-Za-z\-~]+)*)?$")
        .expect("Failed to compile version pattern")
});

/// A validated, `v`-prefixed release tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    /// Prefix `v` when missing and check the result is a semantic version
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let tag = if input.starts_with('v') {
            input.to_string()
        } else {
            format!("v{}", input)
        };

        if !SEMVER.is_match(&tag) {
            return Err(Error::InvalidVersion {
                version: input.to_string(),
                reason: "expected a semantic version such as 1.2.3".to_string(),
            });
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Source of published releases, newest first
#[allow(async_fn_in_trait)]
pub trait ReleaseIndex {
    async fn releases(&self) -> Result<Vec<Release>>;

    /// Body of a release asset
    async fn download(&self, url: &str) -> Result<String>;
}

/// Releases listed by the GitHub API
#[derive(Debug, Clone)]
pub struct GithubReleases {
    http: reqwest::Client,
    url: String,
}

impl GithubReleases {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("corectl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Registry(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Registry(format!("failed to get {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "unexpected HTTP status {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

impl ReleaseIndex for GithubReleases {
    async fn releases(&self) -> Result<Vec<Release>> {
        crate::log_debug!("Fetching releases from {}", self.url);
        self.get(&self.url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Registry(format!("failed to decode releases: {}", e)))
    }

    async fn download(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| Error::Registry(format!("error downloading operator manifest: {}", e)))
    }
}

/// Validates requested versions before anything touches the cluster
pub struct VersionResolver<I> {
    index: I,
}

impl<I: ReleaseIndex> VersionResolver<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    /// `None` for an empty request, otherwise the tag once it is known to be published
    pub async fn resolve(&self, requested: &str) -> Result<Option<VersionTag>> {
        if requested.trim().is_empty() {
            return Ok(None);
        }
        let tag = VersionTag::parse(requested)?;

        let releases = self.index.releases().await?;
        if releases.iter().any(|r| r.tag_name == tag.as_str()) {
            Ok(Some(tag))
        } else {
            Err(Error::VersionNotAvailable(tag.to_string()))
        }
    }

    /// Manifest asset of `version`, or of the newest release when `None`
    pub async fn download_url(&self, version: Option<&VersionTag>) -> Result<String> {
        let releases = self.index.releases().await?;
        if releases.is_empty() {
            return Err(Error::Registry("no releases found".to_string()));
        }

        let release = match version {
            None => &releases[0],
            Some(tag) => releases
                .iter()
                .find(|r| r.tag_name == tag.as_str())
                .ok_or_else(|| Error::VersionNotAvailable(tag.to_string()))?,
        };

        release
            .assets
            .first()
            .map(|a| a.browser_download_url.clone())
            .ok_or_else(|| match version {
                None => Error::Registry("no assets found for the latest release".to_string()),
                Some(tag) => Error::Registry(format!("no assets found for the version: {}", tag)),
            })
    }

    /// Download the operator manifest of a release
    pub async fn fetch_manifest(&self, version: Option<&VersionTag>) -> Result<String> {
        let url = self.download_url(version).await?;
        crate::log_info!("Downloading operator manifest from {}", url);
        self.index.download(&url).await
    }
}
