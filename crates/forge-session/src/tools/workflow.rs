//! Workflow-only tools.

use async_trait::async_trait;
use forge_contract::{
    FileRecord, SessionEvent, Tool, ToolContext, ToolDescriptor, ToolError, ToolResult,
    WorkflowMetadata,
};
use serde_json::{json, Value};

pub struct GenerateFilesTool;

#[async_trait]
impl Tool for GenerateFilesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "generate_files",
            "Write generated workflow source files. The workflow entry point must be src/index.ts.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "purpose": { "type": "string" },
                            "contents": { "type": "string" }
                        },
                        "required": ["path", "contents"]
                    }
                }
            },
            "required": ["files"],
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let entries = args
            .get("files")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut files = Vec::with_capacity(entries.len());
        for entry in &entries {
            let path = entry.get("path").and_then(Value::as_str).unwrap_or_default();
            let contents = entry
                .get("contents")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let purpose = entry.get("purpose").and_then(Value::as_str).unwrap_or("");
            files.push(FileRecord::new(path, contents).with_purpose(purpose));
        }

        for file in &files {
            ctx.agent
                .broadcast(SessionEvent::FileGenerating {
                    file_path: file.file_path.clone(),
                })
                .await;
        }
        match ctx
            .agent
            .save_files(files.clone(), "generate workflow files".into())
            .await
        {
            Ok(()) => {
                for file in &files {
                    ctx.agent
                        .broadcast(SessionEvent::FileGenerated {
                            file_path: file.file_path.clone(),
                            file_purpose: file.file_purpose.clone(),
                        })
                        .await;
                }
                let saved: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();
                Ok(ToolResult::ok("generate_files", json!({ "saved": saved })))
            }
            Err(e) => Ok(ToolResult::error("generate_files", e.to_string())),
        }
    }
}

pub struct ConfigureWorkflowMetadataTool;

#[async_trait]
impl Tool for ConfigureWorkflowMetadataTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "configure_workflow_metadata",
            "Declare or update the workflow's name, parameters, and bindings",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "description": { "type": "string" },
                "params_schema": { "type": "object" },
                "env_vars": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "secrets": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "resources": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "kind": { "type": "string", "enum": ["kv", "r2", "d1", "queue", "ai"] },
                            "name": { "type": "string" }
                        },
                        "required": ["kind"]
                    }
                }
            },
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let mut update: WorkflowMetadata = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        // Binding names default to their map key.
        for (key, resource) in update.resources.iter_mut() {
            if resource.binding.is_empty() {
                resource.binding = key.clone();
            }
        }
        match ctx.agent.merge_workflow_metadata(update).await {
            Ok(merged) => Ok(ToolResult::ok(
                "configure_workflow_metadata",
                serde_json::to_value(&merged).unwrap_or(Value::Null),
            )),
            Err(e) => Ok(ToolResult::error("configure_workflow_metadata", e.to_string())),
        }
    }
}
