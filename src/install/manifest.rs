//! Operator manifest preparation
//!
//! The base manifest targets the `calyptia-core` namespace and pins the
//! operator image. Preparing it rewrites both for the requested install and
//! writes the result to a scoped temporary directory.

use crate::utils::errors::{Error, Result};
use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

/// Manifest shipped with the binary
pub const BASE_MANIFEST: &str = include_str!("../../manifests/operator.yaml");

pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Namespace the base manifest is written for
pub const PLACEHOLDER_NAMESPACE: &str = "calyptia-core";

static OPERATOR_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"image:\s*ghcr\.io/calyptia/core-operator:[^\n\r]*")
        .expect("Failed to compile operator image pattern")
});

/// A namespace that YAML would read as an integer must be quoted
pub fn yaml_namespace(namespace: &str) -> Cow<'_, str> {
    if namespace.parse::<i64>().is_ok() {
        Cow::Owned(format!("\"{}\"", namespace))
    } else {
        Cow::Borrowed(namespace)
    }
}

/// How the placeholders of a manifest are rewritten
pub trait ManifestTemplate {
    /// Keep or drop the leading namespace document. When kept, its name is
    /// replaced with `namespace`.
    ///
    /// Only that first document is renamed. The other documents carry
    /// `calyptia-core-*` object names which share the placeholder as a prefix
    /// and must keep their fixed names for install detection and uninstall.
    fn select_namespace_document(
        &self,
        manifest: &str,
        create_namespace: bool,
        namespace: &str,
    ) -> String;

    /// Point every namespaced object at `namespace`
    fn inject_namespace(&self, manifest: &str, namespace: &str) -> String;

    /// Replace the operator image with `image:version`
    fn set_image(&self, manifest: &str, image: &str, version: &str) -> Result<String>;

    fn render(
        &self,
        base: &str,
        namespace: &str,
        image: &str,
        version: Option<&str>,
        create_namespace: bool,
    ) -> Result<String> {
        let manifest = self.select_namespace_document(base, create_namespace, namespace);
        let manifest = self.inject_namespace(&manifest, namespace);
        match version.filter(|v| !v.is_empty()) {
            Some(version) => self.set_image(&manifest, image, version),
            None => Ok(manifest),
        }
    }
}

/// Literal token and regex substitution
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralTemplate;

impl ManifestTemplate for LiteralTemplate {
    fn select_namespace_document(
        &self,
        manifest: &str,
        create_namespace: bool,
        namespace: &str,
    ) -> String {
        let mut documents: Vec<String> = manifest
            .split(DOCUMENT_SEPARATOR)
            .map(str::to_string)
            .collect();

        if !create_namespace {
            documents.remove(0);
            return documents.join(DOCUMENT_SEPARATOR);
        }

        documents[0] = documents[0].replace(
            &format!("name: {}", PLACEHOLDER_NAMESPACE),
            &format!("name: {}", yaml_namespace(namespace)),
        );
        documents.join(DOCUMENT_SEPARATOR)
    }

    /// Not idempotent when `namespace` starts with the placeholder: a second
    /// pass matches the prefix again.
    fn inject_namespace(&self, manifest: &str, namespace: &str) -> String {
        manifest.replace(
            &format!("namespace: {}", PLACEHOLDER_NAMESPACE),
            &format!("namespace: {}", yaml_namespace(namespace)),
        )
    }

    fn set_image(&self, manifest: &str, image: &str, version: &str) -> Result<String> {
        if !OPERATOR_IMAGE.is_match(manifest) {
            return Err(Error::ImageNotFoundInManifest);
        }
        let replacement = format!("image: {}:{}", image, version);
        Ok(OPERATOR_IMAGE
            .replace_all(manifest, NoExpand(&replacement))
            .into_owned())
    }
}

/// A rendered manifest on disk. The directory is removed on drop.
#[derive(Debug)]
pub struct PreparedManifest {
    dir: TempDir,
    path: PathBuf,
    contents: String,
}

impl PreparedManifest {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Name of the deployment the manifest ends with
    pub fn deployment_name(&self) -> Result<String> {
        extract_deployment_name(&self.contents)
    }
}

/// Renders a base manifest for one install
#[derive(Debug, Clone)]
pub struct ManifestPreparer<T = LiteralTemplate> {
    base: String,
    template: T,
}

impl ManifestPreparer<LiteralTemplate> {
    /// Preparer over the manifest embedded in the binary
    pub fn embedded() -> Self {
        Self::from_base(BASE_MANIFEST)
    }

    /// Preparer over a downloaded release manifest
    pub fn from_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            template: LiteralTemplate,
        }
    }
}

impl<T: ManifestTemplate> ManifestPreparer<T> {
    pub fn with_template(base: impl Into<String>, template: T) -> Self {
        Self {
            base: base.into(),
            template,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Render the manifest and write it into a fresh temporary directory
    pub fn prepare(
        &self,
        namespace: &str,
        image: &str,
        version: Option<&str>,
        create_namespace: bool,
    ) -> Result<PreparedManifest> {
        let contents =
            self.template
                .render(&self.base, namespace, image, version, create_namespace)?;

        let dir = tempfile::Builder::new()
            .prefix("calyptia-operator")
            .tempdir()?;
        let mut file = tempfile::Builder::new()
            .prefix("operator_")
            .suffix(".yaml")
            .tempfile_in(dir.path())?;
        file.write_all(contents.as_bytes())?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        crate::log_debug!("Prepared operator manifest at {}", path.display());
        Ok(PreparedManifest {
            dir,
            path,
            contents,
        })
    }
}

/// `metadata.name` of the last document, which is the operator deployment
pub fn extract_deployment_name(manifest: &str) -> Result<String> {
    let last = manifest
        .split(DOCUMENT_SEPARATOR)
        .filter(|doc| !doc.trim().is_empty())
        .last()
        .ok_or_else(|| Error::InvalidManifest("manifest is empty".to_string()))?;

    let document: serde_yaml::Value = serde_yaml::from_str(last)?;
    document
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidManifest("last document has no metadata.name".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::images::{DEFAULT_OPERATOR_IMAGE, DEFAULT_OPERATOR_IMAGE_TAG};

    fn documents(manifest: &str) -> Vec<&str> {
        manifest.split(DOCUMENT_SEPARATOR).collect()
    }

    #[test]
    fn test_embedded_manifest_shape() {
        let docs = documents(BASE_MANIFEST);
        assert!(docs[0].contains("kind: Namespace"));
        assert!(docs[0].contains("name: calyptia-core"));
        assert!(OPERATOR_IMAGE.is_match(BASE_MANIFEST));
        assert_eq!(
            extract_deployment_name(BASE_MANIFEST).unwrap(),
            "calyptia-core-controller-manager"
        );
        assert!(BASE_MANIFEST.contains(&format!(
            "image: {}:{}",
            DEFAULT_OPERATOR_IMAGE, DEFAULT_OPERATOR_IMAGE_TAG
        )));
    }

    #[test]
    fn test_stripping_namespace_keeps_other_documents_identical() {
        let with_ns = LiteralTemplate.render(BASE_MANIFEST, "observability", "img", None, true).unwrap();
        let without_ns = LiteralTemplate.render(BASE_MANIFEST, "observability", "img", None, false).unwrap();

        let with_docs = documents(&with_ns);
        assert_eq!(documents(&without_ns), with_docs[1..]);
        assert!(with_docs[0].contains("name: observability"));
        assert!(!without_ns.contains("kind: Namespace"));
    }

    #[test]
    fn test_namespace_injection_replaces_every_placeholder() {
        let rendered = LiteralTemplate.render(BASE_MANIFEST, "observability", "img", None, false).unwrap();
        assert!(!rendered.contains("namespace: calyptia-core"));
        assert_eq!(
            rendered.matches("namespace: observability").count(),
            BASE_MANIFEST.matches("namespace: calyptia-core").count()
        );
    }

    #[test]
    fn test_namespace_rename_leaves_prefixed_names_alone() {
        let rendered = LiteralTemplate.select_namespace_document(BASE_MANIFEST, true, "observability");
        let docs = documents(&rendered);

        assert!(docs[0].contains("name: observability"));
        assert!(!docs[0].contains("name: calyptia-core"));
        assert!(rendered.contains("name: calyptia-core-controller-manager"));
        assert!(rendered.contains("name: calyptia-core-manager-role"));
        assert!(!rendered.contains("name: observability-"));
    }

    #[test]
    fn test_integer_namespace_is_quoted() {
        let rendered = LiteralTemplate.render(BASE_MANIFEST, "123", "img", None, true).unwrap();
        assert!(rendered.contains("namespace: \"123\""));
        assert!(documents(&rendered)[0].contains("name: \"123\""));
        assert_eq!(yaml_namespace("core-1"), "core-1");
    }

    #[test]
    fn test_inject_namespace_prefix_collision() {
        let template = LiteralTemplate;
        let once = template.inject_namespace("namespace: calyptia-core\n", "other");
        assert_eq!(template.inject_namespace(&once, "other"), once);

        let once = template.inject_namespace("namespace: calyptia-core\n", "calyptia-core-x");
        let twice = template.inject_namespace(&once, "calyptia-core-x");
        assert_eq!(twice, "namespace: calyptia-core-x-x\n");
    }

    #[test]
    fn test_set_image_replaces_every_match() {
        let manifest = "image: ghcr.io/calyptia/core-operator:v1\n---\nimage:   ghcr.io/calyptia/core-operator:latest\r\n";
        let rendered = LiteralTemplate
            .set_image(manifest, "registry.local/core-operator", "v9.9.9")
            .unwrap();
        assert_eq!(
            rendered.matches("image: registry.local/core-operator:v9.9.9").count(),
            2
        );
        assert!(rendered.ends_with("\r\n"));
    }

    #[test]
    fn test_set_image_without_match_fails() {
        let err = LiteralTemplate
            .set_image("image: busybox:1.36\n", "img", "v1")
            .unwrap_err();
        assert!(matches!(err, Error::ImageNotFoundInManifest));
    }

    #[test]
    fn test_empty_version_keeps_shipped_image() {
        let rendered = LiteralTemplate.render(BASE_MANIFEST, "ns", "other", Some(""), true).unwrap();
        assert!(rendered.contains(DEFAULT_OPERATOR_IMAGE_TAG));
        assert!(!rendered.contains("image: other"));
    }

    #[test]
    fn test_prepare_writes_scoped_file() {
        let preparer = ManifestPreparer::embedded();
        let dir;
        {
            let prepared = preparer
                .prepare("observability", DEFAULT_OPERATOR_IMAGE, Some("v2.5.0"), true)
                .unwrap();
            dir = prepared.dir().to_path_buf();

            let file_name = prepared.path().file_name().unwrap().to_string_lossy().to_string();
            assert!(file_name.starts_with("operator_") && file_name.ends_with(".yaml"));
            assert!(
                dir.file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with("calyptia-operator")
            );
            let on_disk = std::fs::read_to_string(prepared.path()).unwrap();
            assert_eq!(on_disk, prepared.contents());
            assert!(on_disk.contains("image: ghcr.io/calyptia/core-operator:v2.5.0"));
            assert_eq!(
                prepared.deployment_name().unwrap(),
                "calyptia-core-controller-manager"
            );
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_extract_deployment_name_errors() {
        assert!(matches!(
            extract_deployment_name("---\n"),
            Err(Error::InvalidManifest(_))
        ));
        assert!(matches!(
            extract_deployment_name("kind: Deployment\nspec: {}\n"),
            Err(Error::InvalidManifest(_))
        ));
    }
}
