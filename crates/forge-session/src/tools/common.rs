//! Tools available to both project variants.

use async_trait::async_trait;
use forge_contract::{
    DeepDebugRequest, PendingUserInput, SessionEvent, Tool, ToolContext, ToolDescriptor,
    ToolError, ToolResult,
};
use serde_json::{json, Value};

fn arg_str(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("web_search", "Search the web for current information")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" }
                },
                "required": ["query"],
                "additionalProperties": false
            }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        match ctx.agent.web_search(arg_str(&args, "query")).await {
            Ok(results) => Ok(ToolResult::ok("web_search", json!({ "results": results }))),
            Err(e) => Ok(ToolResult::error("web_search", e.to_string())),
        }
    }
}

pub struct FeedbackTool;

#[async_trait]
impl Tool for FeedbackTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "feedback",
            "Record a project-update note surfaced at the next generation step",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "note": { "type": "string" }
            },
            "required": ["note"],
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        ctx.agent.note_project_update(arg_str(&args, "note")).await;
        Ok(ToolResult::ok("feedback", json!({ "recorded": true })))
    }
}

pub struct QueueRequestTool;

#[async_trait]
impl Tool for QueueRequestTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "queue_request",
            "Queue a user request for the next safe merge point",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"],
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        ctx.agent
            .queue_user_request(PendingUserInput {
                text: arg_str(&args, "text"),
                images: Vec::new(),
            })
            .await;
        Ok(ToolResult::ok("queue_request", json!({ "queued": true })))
    }
}

pub struct GetLogsTool;

#[async_trait]
impl Tool for GetLogsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("get_logs", "Fetch sandbox logs").with_parameters(json!({
            "type": "object",
            "properties": {
                "reset": { "type": "boolean", "description": "Clear the log buffer after reading" }
            },
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let reset = args.get("reset").and_then(Value::as_bool).unwrap_or(false);
        let response = ctx.agent.get_logs(reset).await;
        if response.success {
            Ok(ToolResult::ok("get_logs", json!({ "logs": response.logs })))
        } else {
            Ok(ToolResult::error(
                "get_logs",
                response.error.unwrap_or_else(|| "log fetch failed".into()),
            ))
        }
    }
}

pub struct DeployPreviewTool;

#[async_trait]
impl Tool for DeployPreviewTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("deploy_preview", "Deploy the current files to the sandbox preview")
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        match ctx.agent.deploy_preview().await {
            Ok(url) => Ok(ToolResult::ok(
                "deploy_preview",
                json!({ "preview_url": url }),
            )),
            Err(e) => Ok(ToolResult::error("deploy_preview", e.to_string())),
        }
    }
}

pub struct WaitForGenerationTool;

#[async_trait]
impl Tool for WaitForGenerationTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "wait_for_generation",
            "Wait until the in-flight generation finishes",
        )
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        if ctx.in_generation {
            return Ok(ToolResult::ok(
                "wait_for_generation",
                json!({ "idle": false, "note": "this dialogue is the in-flight generation" }),
            ));
        }
        ctx.agent.wait_for_generation().await;
        Ok(ToolResult::ok("wait_for_generation", json!({ "idle": true })))
    }
}

pub struct WaitForDebugTool;

#[async_trait]
impl Tool for WaitForDebugTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "wait_for_debug",
            "Wait until the in-flight deep-debug session finishes",
        )
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        ctx.agent.wait_for_debug().await;
        Ok(ToolResult::ok("wait_for_debug", json!({ "idle": true })))
    }
}

pub struct RenameProjectTool;

#[async_trait]
impl Tool for RenameProjectTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("rename_project", "Rename the project").with_parameters(json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "New project name (lowercase, 3-50 chars)"
                }
            },
            "required": ["name"],
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let name = arg_str(&args, "name");
        match ctx.agent.rename_project(name.clone()).await {
            Ok(()) => {
                ctx.agent
                    .broadcast(SessionEvent::ProjectNameUpdated {
                        project_name: name.clone(),
                    })
                    .await;
                Ok(ToolResult::ok(
                    "rename_project",
                    json!({ "project_name": name }),
                ))
            }
            Err(e) => Ok(ToolResult::error("rename_project", e.to_string())),
        }
    }
}

pub struct GitTool;

#[async_trait]
impl Tool for GitTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("git", "Inspect the project's version history (read-only)")
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "enum": ["log", "status"] },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 50 }
                },
                "required": ["command"],
                "additionalProperties": false
            }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .min(50) as usize;
        match arg_str(&args, "command").as_str() {
            "log" => {
                let commits = ctx.agent.git_log(limit).await;
                Ok(ToolResult::ok("git", json!({ "commits": commits })))
            }
            "status" => {
                let head = ctx.agent.git_log(1).await.into_iter().next();
                let files = ctx.agent.read_files(None).await.len();
                Ok(ToolResult::ok(
                    "git",
                    json!({ "head": head, "tracked_files": files }),
                ))
            }
            other => Ok(ToolResult::error(
                "git",
                format!("unsupported git command: {other}"),
            )),
        }
    }
}

pub struct DeepDebuggerTool;

#[async_trait]
impl Tool for DeepDebuggerTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "deep_debugger",
            "Run the deep-debug diagnostic loop against the current runtime errors",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "issue": { "type": "string", "description": "What looks broken" },
                "focus_paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Restrict the file index to these path prefixes"
                }
            },
            "required": ["issue"],
            "additionalProperties": false
        }))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let focus_paths = args
            .get("focus_paths")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let outcome = ctx
            .agent
            .deep_debug(DeepDebugRequest {
                issue: arg_str(&args, "issue"),
                previous_transcript: None,
                focus_paths,
            })
            .await;
        if outcome.success {
            Ok(ToolResult::ok(
                "deep_debugger",
                json!({ "transcript": outcome.transcript }),
            ))
        } else {
            Ok(ToolResult::error(
                "deep_debugger",
                outcome.error.unwrap_or_else(|| "deep debug failed".into()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAgent;
    use forge_contract::{OperationController, ProjectType};
    use std::sync::Arc;

    fn ctx() -> (Arc<StubAgent>, ToolContext) {
        let agent = Arc::new(StubAgent::new(ProjectType::App));
        let controller = OperationController::new();
        let ctx = ToolContext::new(agent.clone(), controller.current());
        (agent, ctx)
    }

    #[tokio::test]
    async fn feedback_records_project_update() {
        let (agent, ctx) = ctx();
        let result = FeedbackTool
            .execute(json!({"note": "switched to tabs"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error());
        let state = agent.state.lock().unwrap();
        assert_eq!(state.base.project_updates, vec!["switched to tabs"]);
    }

    #[tokio::test]
    async fn queue_request_lands_in_pending_inputs() {
        let (agent, ctx) = ctx();
        QueueRequestTool
            .execute(json!({"text": "add dark mode"}), &ctx)
            .await
            .unwrap();
        let state = agent.state.lock().unwrap();
        assert_eq!(state.base.pending_user_inputs.len(), 1);
        assert_eq!(state.base.pending_user_inputs[0].text, "add dark mode");
    }

    #[tokio::test]
    async fn rename_project_broadcasts_update() {
        let (agent, ctx) = ctx();
        let result = RenameProjectTool
            .execute(json!({"name": "renamed-app"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error());
        assert_eq!(agent.event_tags(), vec!["project_name_updated"]);
        assert_eq!(agent.state.lock().unwrap().base.project_name, "renamed-app");
    }

    #[tokio::test]
    async fn rename_project_rejects_invalid_name() {
        let (agent, ctx) = ctx();
        let result = RenameProjectTool
            .execute(json!({"name": "NO CAPS"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(agent.event_tags().is_empty());
    }

    #[tokio::test]
    async fn git_log_and_status_are_read_only_views() {
        let (_, ctx) = ctx();
        let log = GitTool
            .execute(json!({"command": "log", "limit": 5}), &ctx)
            .await
            .unwrap();
        assert!(log.data["commits"].is_array());

        let status = GitTool.execute(json!({"command": "status"}), &ctx).await.unwrap();
        assert!(status.data["head"].is_object());

        let bad = GitTool.execute(json!({"command": "push"}), &ctx).await.unwrap();
        assert!(bad.is_error());
    }

    #[tokio::test]
    async fn deep_debugger_returns_transcript() {
        let (_, ctx) = ctx();
        let result = DeepDebuggerTool
            .execute(json!({"issue": "blank screen", "focus_paths": ["src/"]}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error());
        assert!(result.data["transcript"]
            .as_str()
            .unwrap()
            .contains("blank screen"));
    }

    #[tokio::test]
    async fn web_search_reports_unconfigured_provider_as_error_result() {
        let (agent, ctx) = ctx();
        *agent.web_results.lock().unwrap() = None;
        let result = WebSearchTool
            .execute(json!({"query": "react docs"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
    }
}
