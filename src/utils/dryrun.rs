//! Dry-run output: objects that would be sent to the cluster, rendered as YAML

use crate::utils::errors::Result;
use colored::Colorize;
use serde::Serialize;

/// Collects objects built in dry-run mode
#[derive(Debug, Default)]
pub struct DryRunReport {
    documents: Vec<String>,
}

impl DryRunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Serialize>(&mut self, object: &T) -> Result<()> {
        self.documents.push(serde_yaml::to_string(object)?);
        Ok(())
    }

    /// Add an already rendered manifest, one entry per document
    pub fn push_manifest(&mut self, manifest: &str) {
        self.documents.extend(
            manifest
                .split("---\n")
                .filter(|doc| !doc.trim().is_empty())
                .map(str::to_string),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Multi-document YAML
    pub fn render(&self) -> String {
        self.documents.join("---\n")
    }

    /// Print the documents to stdout, framed by a notice on stderr
    pub fn print(&self) {
        eprintln!(
            "{}",
            format!(
                "[DRY RUN] {} object(s) would be applied:",
                self.documents.len()
            )
            .cyan()
            .bold()
        );
        print!("{}", self.render());
        eprintln!("{}", "No changes were made (--dry-run mode)".yellow());
    }
}

/// Log a dry-run action
pub fn log_action(action: &str) {
    eprintln!("  {} {}", "[DRY RUN]".cyan().bold(), action);
}
