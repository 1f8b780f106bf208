//! Server-side apply of multi-document manifests through the dynamic API

use crate::utils::errors::{Error, Result, is_api_not_found};
use kube::Client;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams,
};
use serde::Deserialize;

/// Field manager recorded on applied objects
pub const FIELD_MANAGER: &str = "corectl";

/// One object of a manifest, ready to be sent through the dynamic API
#[derive(Debug, Clone)]
pub struct ManifestObject {
    pub resource: ApiResource,
    pub name: String,
    pub namespace: Option<String>,
    pub value: serde_json::Value,
}

impl ManifestObject {
    fn from_value(value: serde_json::Value) -> Result<Self> {
        let field = |pointer: &str| value.pointer(pointer).and_then(|v| v.as_str());

        let kind = field("/kind")
            .ok_or_else(|| Error::InvalidManifest("document without kind".to_string()))?;
        let api_version = field("/apiVersion")
            .ok_or_else(|| Error::InvalidManifest(format!("{} without apiVersion", kind)))?;
        let name = field("/metadata/name")
            .ok_or_else(|| Error::InvalidManifest(format!("{} without metadata.name", kind)))?;

        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind));
        let name = name.to_string();
        let namespace = field("/metadata/namespace").map(str::to_string);

        Ok(Self {
            resource,
            name,
            namespace,
            value,
        })
    }

    fn api(&self, client: &Client) -> Api<DynamicObject> {
        match &self.namespace {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &self.resource),
            None => Api::all_with(client.clone(), &self.resource),
        }
    }
}

impl std::fmt::Display for ManifestObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource.kind, self.name)
    }
}

/// Split a manifest into its objects, skipping empty documents
pub fn parse_documents(manifest: &str) -> Result<Vec<ManifestObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_json::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        objects.push(ManifestObject::from_value(value)?);
    }
    Ok(objects)
}

/// Apply every document in order. Returns the applied objects.
pub async fn apply_manifest(client: &Client, manifest: &str) -> Result<Vec<ManifestObject>> {
    let objects = parse_documents(manifest)?;
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for object in &objects {
        object
            .api(client)
            .patch(&object.name, &params, &Patch::Apply(&object.value))
            .await?;
        crate::log_debug!("Applied {}", object);
    }
    Ok(objects)
}

/// Delete every document in reverse order; objects already gone are skipped
pub async fn delete_manifest(client: &Client, manifest: &str) -> Result<Vec<ManifestObject>> {
    let objects = parse_documents(manifest)?;
    let mut deleted = Vec::with_capacity(objects.len());

    for object in objects.into_iter().rev() {
        match object
            .api(client)
            .delete(&object.name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                crate::log_debug!("Deleted {}", object);
                deleted.push(object);
            }
            Err(e) if is_api_not_found(&e) => {
                crate::log_debug!("{} already absent", object);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(deleted)
}
