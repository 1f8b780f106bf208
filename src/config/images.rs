//! Container image references used by the operator and core instances

use crate::utils::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Repository of the operator manager image, as it appears in the base manifest
pub const DEFAULT_OPERATOR_IMAGE: &str = "ghcr.io/calyptia/core-operator";

/// Tag installed when no version is requested
pub const DEFAULT_OPERATOR_IMAGE_TAG: &str = "v2.4.1";

/// Repository of the sync container pushing state to the cloud
pub const DEFAULT_SYNC_TO_CLOUD_IMAGE: &str = "ghcr.io/calyptia/core-operator/sync-to-cloud";

/// Repository of the sync container pulling state from the cloud
pub const DEFAULT_SYNC_FROM_CLOUD_IMAGE: &str = "ghcr.io/calyptia/core-operator/sync-from-cloud";

/// Repository of the legacy single-container core workload
pub const DEFAULT_CORE_IMAGE: &str = "ghcr.io/calyptia/core";

/// A parsed `repository[:tag][@digest]` image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    /// `algorithm:hex` after the `@`
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parse an image reference. The digest is split off at `@` first. A `:`
    /// only counts as the tag delimiter when it comes after the last `/`, so
    /// registry ports are kept in the repository.
    pub fn parse(image: &str) -> Self {
        let (name, digest) = match image.split_once('@') {
            Some((name, digest)) => (name, (!digest.is_empty()).then(|| digest.to_string())),
            None => (image, None),
        };

        let name_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match name[name_start..].rfind(':') {
            Some(offset) => {
                let split = name_start + offset;
                let tag = &name[split + 1..];
                (&name[..split], (!tag.is_empty()).then(|| tag.to_string()))
            }
            None => (name, None),
        };

        Self {
            repository: repository.to_string(),
            tag,
            digest,
        }
    }

    /// Build `repository:tag`
    pub fn with_tag(repository: &str, tag: &str) -> String {
        format!("{}:{}", repository, tag)
    }

    /// The tag, or an error naming the full image
    pub fn require_tag(image: &str) -> Result<String> {
        Self::parse(image)
            .tag
            .ok_or_else(|| Error::InvalidImage(image.to_string()))
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
