//! Core instance descriptor handed over by the cloud API

use anyhow::{Result, anyhow};

/// A core instance record as created in the cloud. Only the fields the
/// cluster workload needs are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInstance {
    pub name: String,
    pub environment_name: String,
    pub private_rsa_key: Vec<u8>,
    pub id: Option<String>,
    pub project_id: Option<String>,
}

impl CoreInstance {
    pub fn builder() -> CoreInstanceBuilder {
        CoreInstanceBuilder::new()
    }
}

/// Builder for [`CoreInstance`]
#[derive(Debug, Clone, Default)]
pub struct CoreInstanceBuilder {
    name: Option<String>,
    environment_name: Option<String>,
    private_rsa_key: Vec<u8>,
    id: Option<String>,
    project_id: Option<String>,
}

impl CoreInstanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment_name = Some(environment.into());
        self
    }

    pub fn private_rsa_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.private_rsa_key = key.into();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Build the descriptor. The environment defaults to `default`, matching the cloud.
    pub fn build(self) -> Result<CoreInstance> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| anyhow!("core instance name is required"))?;

        Ok(CoreInstance {
            name,
            environment_name: self
                .environment_name
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "default".to_string()),
            private_rsa_key: self.private_rsa_key,
            id: self.id,
            project_id: self.project_id,
        })
    }
}
