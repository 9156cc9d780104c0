//! Workflow metadata: name, parameters schema, and resource bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of a sandboxed platform resource a workflow binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Kv,
    R2,
    D1,
    Queue,
    Ai,
}

impl ResourceKind {
    /// The wrangler config section this kind maps to.
    pub fn wrangler_section(self) -> &'static str {
        match self {
            Self::Kv => "kv_namespaces",
            Self::R2 => "r2_buckets",
            Self::D1 => "d1_databases",
            Self::Queue => "queues.producers",
            Self::Ai => "ai",
        }
    }
}

/// One named resource binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBinding {
    pub kind: ResourceKind,
    /// Binding name visible to the workflow code. Defaults to the map key
    /// it is stored under.
    #[serde(default)]
    pub binding: String,
    /// Backing resource name (bucket, namespace, queue, ...), when distinct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Declarative description of a generated workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the workflow's input parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
    /// Secret name -> human description. Values never pass through here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
    /// Binding name -> resource declaration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceBinding>,
}

impl WorkflowMetadata {
    /// Merge `update` into `self`.
    ///
    /// Scalar fields are last-writer-wins when the update carries a value.
    /// Map fields are unioned: new keys added, existing keys overwritten.
    /// Keys absent from the update are kept; there is no way to remove a
    /// previously declared binding through this merge.
    pub fn merge(&mut self, update: WorkflowMetadata) {
        if update.name.is_some() {
            self.name = update.name;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if update.params_schema.is_some() {
            self.params_schema = update.params_schema;
        }
        self.env_vars.extend(update.env_vars);
        self.secrets.extend(update.secrets);
        self.resources.extend(update.resources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kv(binding: &str) -> ResourceBinding {
        ResourceBinding {
            kind: ResourceKind::Kv,
            binding: binding.to_string(),
            name: None,
        }
    }

    #[test]
    fn merge_overwrites_scalars_when_present() {
        let mut meta = WorkflowMetadata {
            name: Some("old".into()),
            description: Some("keep me".into()),
            ..Default::default()
        };
        meta.merge(WorkflowMetadata {
            name: Some("new".into()),
            ..Default::default()
        });
        assert_eq!(meta.name.as_deref(), Some("new"));
        assert_eq!(meta.description.as_deref(), Some("keep me"));
    }

    #[test]
    fn merge_unions_maps_and_keeps_absent_keys() {
        let mut meta = WorkflowMetadata::default();
        meta.resources.insert("CACHE".into(), kv("CACHE"));
        meta.env_vars.insert("MODE".into(), "dev".into());

        let mut update = WorkflowMetadata::default();
        update.resources.insert(
            "FILES".into(),
            ResourceBinding {
                kind: ResourceKind::R2,
                binding: "FILES".into(),
                name: Some("uploads".into()),
            },
        );
        update.env_vars.insert("MODE".into(), "prod".into());
        meta.merge(update);

        assert_eq!(meta.resources.len(), 2);
        assert!(meta.resources.contains_key("CACHE"));
        assert_eq!(meta.env_vars["MODE"], "prod");
    }

    #[test]
    fn merge_cannot_remove_bindings() {
        let mut meta = WorkflowMetadata::default();
        meta.resources.insert("CACHE".into(), kv("CACHE"));
        meta.merge(WorkflowMetadata::default());
        assert!(meta.resources.contains_key("CACHE"));
    }

    #[test]
    fn resource_kind_maps_to_wrangler_sections() {
        assert_eq!(ResourceKind::Kv.wrangler_section(), "kv_namespaces");
        assert_eq!(ResourceKind::Queue.wrangler_section(), "queues.producers");
        assert_eq!(ResourceKind::Ai.wrangler_section(), "ai");
    }

    #[test]
    fn metadata_round_trips() {
        let mut meta = WorkflowMetadata {
            name: Some("scheduled-slack".into()),
            params_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        meta.secrets.insert("SLACK_TOKEN".into(), "bot token".into());
        let text = serde_json::to_string(&meta).unwrap();
        let parsed: WorkflowMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, meta);
    }
}
