//! Configuration file support for corectl

use crate::config::images;
use crate::install::version::DEFAULT_RELEASES_URL;
use crate::k8s::resources::OrchestratorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub images: Images,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub registry: Registry,
}

/// Default values for common operations
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Defaults {
    /// Namespace to install into. If not set, the kubeconfig context
    /// namespace is used, then `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    #[serde(default = "default_cloud_url")]
    pub cloud_url: String,

    #[serde(default = "default_true")]
    pub tls_verify: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: String,

    /// Ask before installing over the leftovers of a previous install
    #[serde(default = "default_true")]
    pub confirm_reinstall: bool,
}

/// Image repositories and tags
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Images {
    #[serde(default = "default_operator_image")]
    pub operator: String,

    #[serde(default = "default_operator_tag")]
    pub operator_tag: String,

    #[serde(default = "default_core_image")]
    pub core: String,

    #[serde(default = "default_sync_to_cloud_image")]
    pub sync_to_cloud: String,

    #[serde(default = "default_sync_from_cloud_image")]
    pub sync_from_cloud: String,
}

/// Release registry settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Registry {
    #[serde(default = "default_releases_url")]
    pub releases_url: String,
}

fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_cloud_url() -> String {
    "https://cloud-api.calyptia.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> String {
    "15334".to_string()
}

fn default_operator_image() -> String {
    images::DEFAULT_OPERATOR_IMAGE.to_string()
}

fn default_operator_tag() -> String {
    images::DEFAULT_OPERATOR_IMAGE_TAG.to_string()
}

fn default_core_image() -> String {
    images::DEFAULT_CORE_IMAGE.to_string()
}

fn default_sync_to_cloud_image() -> String {
    images::DEFAULT_SYNC_TO_CLOUD_IMAGE.to_string()
}

fn default_sync_from_cloud_image() -> String {
    images::DEFAULT_SYNC_FROM_CLOUD_IMAGE.to_string()
}

fn default_releases_url() -> String {
    DEFAULT_RELEASES_URL.to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            namespace: None,
            wait_timeout_secs: default_wait_timeout_secs(),
            cloud_url: default_cloud_url(),
            tls_verify: default_true(),
            metrics_port: default_metrics_port(),
            confirm_reinstall: default_true(),
        }
    }
}

impl Default for Images {
    fn default() -> Self {
        Self {
            operator: default_operator_image(),
            operator_tag: default_operator_tag(),
            core: default_core_image(),
            sync_to_cloud: default_sync_to_cloud_image(),
            sync_from_cloud: default_sync_from_cloud_image(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            releases_url: default_releases_url(),
        }
    }
}

impl Defaults {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Settings {
    /// Load settings from file or return defaults
    pub fn load() -> Self {
        match Self::find_config_file() {
            Some(path) => match Self::load_from_file(&path) {
                Ok(settings) => settings,
                Err(e) => {
                    crate::log_warn!("Ignoring config file: {:#}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Find config file in standard locations
    /// Priority:
    /// 1. .corectl.toml in current directory
    /// 2. ~/.config/corectl/config.toml (XDG config directory)
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(".corectl.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("corectl").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example config file content
    pub fn example_config() -> Result<String> {
        let header = "# corectl configuration file\n\
                      # Place this file at ~/.config/corectl/config.toml or .corectl.toml in your project\n\n";
        let body = toml::to_string_pretty(&Settings::default())
            .context("Failed to serialize default settings")?;
        Ok(format!("{}{}", header, body))
    }
}
