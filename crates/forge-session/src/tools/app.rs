//! App-only tools.

use async_trait::async_trait;
use forge_contract::{Blueprint, Tool, ToolContext, ToolDescriptor, ToolError, ToolResult};
use serde_json::{json, Value};

pub struct AlterBlueprintTool;

#[async_trait]
impl Tool for AlterBlueprintTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("alter_blueprint", "Replace or adjust the project blueprint")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "frameworks": { "type": "array", "items": { "type": "string" } },
                    "phases": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "description": { "type": "string" },
                                "files": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "path": { "type": "string" },
                                            "purpose": { "type": "string" }
                                        },
                                        "required": ["path"]
                                    }
                                },
                                "last_phase": { "type": "boolean" }
                            },
                            "required": ["name"]
                        }
                    }
                },
                "required": ["title"],
                "additionalProperties": false
            }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let patch: Blueprint = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        match ctx.agent.alter_blueprint(patch).await {
            Ok(()) => Ok(ToolResult::ok("alter_blueprint", json!({ "updated": true }))),
            Err(e) => Ok(ToolResult::error("alter_blueprint", e.to_string())),
        }
    }
}

pub struct RegenerateFileTool;

#[async_trait]
impl Tool for RegenerateFileTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("regenerate_file", "Regenerate a single generated file")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Relative file path" }
                },
                "required": ["path"],
                "additionalProperties": false
            }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match ctx.agent.regenerate_file(path).await {
            Ok(file) => Ok(ToolResult::ok(
                "regenerate_file",
                json!({
                    "file_path": file.file_path,
                    "file_purpose": file.file_purpose,
                }),
            )),
            Err(e) => Ok(ToolResult::error("regenerate_file", e.to_string())),
        }
    }
}
