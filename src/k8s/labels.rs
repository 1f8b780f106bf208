//! Labels stamped on managed objects
//!
//! Recommended labels: https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/

use crate::config::CoreInstance;
use std::collections::BTreeMap;

pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_CREATED_BY: &str = "app.kubernetes.io/created-by";

pub const LABEL_PROJECT_ID: &str = "calyptia_project_id";
pub const LABEL_CORE_INSTANCE_ID: &str = "calyptia_core_instance_id";
pub const LABEL_CORE_INSTANCE_NAME: &str = "calyptia_core_instance_name";

const PART_OF: &str = "calyptia";
const MANAGER: &str = "corectl";

/// Labels identifying every object belonging to one core instance
pub fn core_instance_labels(instance: &CoreInstance) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_PART_OF.to_string(), PART_OF.to_string());
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGER.to_string());
    labels.insert(LABEL_CREATED_BY.to_string(), MANAGER.to_string());
    labels.insert(
        LABEL_CORE_INSTANCE_NAME.to_string(),
        instance.name.clone(),
    );
    if let Some(id) = &instance.id {
        labels.insert(LABEL_CORE_INSTANCE_ID.to_string(), id.clone());
    }
    if let Some(project_id) = &instance.project_id {
        labels.insert(LABEL_PROJECT_ID.to_string(), project_id.clone());
    }
    labels
}

/// Render labels as an equality-based selector (`k1=v1,k2=v2`)
pub fn selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Selector matching every object of one core instance by name
pub fn core_instance_selector(name: &str) -> String {
    format!("{}={}", LABEL_CORE_INSTANCE_NAME, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_include_optional_ids() {
        let instance = CoreInstance::builder()
            .name("edge")
            .id("ci-1")
            .project_id("p-1")
            .build()
            .unwrap();
        let labels = core_instance_labels(&instance);
        assert_eq!(labels[LABEL_CORE_INSTANCE_NAME], "edge");
        assert_eq!(labels[LABEL_CORE_INSTANCE_ID], "ci-1");
        assert_eq!(labels[LABEL_PROJECT_ID], "p-1");
        assert_eq!(labels[LABEL_MANAGED_BY], "corectl");
    }

    #[test]
    fn test_selector_is_sorted_and_joined() {
        let mut labels = BTreeMap::new();
        labels.insert("b".to_string(), "2".to_string());
        labels.insert("a".to_string(), "1".to_string());
        assert_eq!(selector(&labels), "a=1,b=2");
        assert_eq!(
            core_instance_selector("edge"),
            "calyptia_core_instance_name=edge"
        );
    }
}
