//! Tool registry and dispatcher (C9).
//!
//! Dispatch validates arguments against the declared JSON Schema before the
//! implementation runs; a schema failure returns an error result without
//! invoking the tool. Tool failures come back as error results, never as
//! panics or `Err` across the dispatch boundary.

mod app;
mod common;
mod workflow;

pub use app::{AlterBlueprintTool, RegenerateFileTool};
pub use common::{
    DeepDebuggerTool, DeployPreviewTool, FeedbackTool, GetLogsTool, GitTool, QueueRequestTool,
    RenameProjectTool, WaitForDebugTool, WaitForGenerationTool, WebSearchTool,
};
pub use workflow::{ConfigureWorkflowMetadataTool, GenerateFilesTool};

use forge_contract::{ProjectType, Tool, ToolContext, ToolDescriptor, ToolResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.descriptor().name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Route one tool call: validate, fire `on_start`, execute, fire
    /// `on_complete`, return the result.
    pub async fn dispatch(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(name, format!("unknown tool: {name}"));
        };

        if let Err(e) = tool.validate_args(&args) {
            debug!(tool = name, error = %e, "tool argument validation failed");
            return ToolResult::error(name, e.to_string());
        }

        tool.on_start(&args, ctx).await;
        let result = match tool.execute(args.clone(), ctx).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(name, e.to_string()),
        };
        tool.on_complete(&args, &result, ctx).await;
        result
    }
}

/// Tools available to every session.
pub fn common_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(WebSearchTool),
        Arc::new(FeedbackTool),
        Arc::new(QueueRequestTool),
        Arc::new(GetLogsTool),
        Arc::new(DeployPreviewTool),
        Arc::new(WaitForGenerationTool),
        Arc::new(WaitForDebugTool),
        Arc::new(RenameProjectTool),
        Arc::new(GitTool),
        Arc::new(DeepDebuggerTool),
    ]
}

/// Compose the full tool set for a project type.
pub fn registry_for(project_type: ProjectType) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in common_tools() {
        registry.register(tool);
    }
    match project_type {
        ProjectType::App => {
            registry.register(Arc::new(AlterBlueprintTool));
            registry.register(Arc::new(RegenerateFileTool));
        }
        ProjectType::Workflow => {
            registry.register(Arc::new(GenerateFilesTool));
            registry.register(Arc::new(ConfigureWorkflowMetadataTool));
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAgent;
    use async_trait::async_trait;
    use forge_contract::{OperationController, ToolError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(project_type: ProjectType) -> (Arc<StubAgent>, ToolContext) {
        let agent = Arc::new(StubAgent::new(project_type));
        let controller = OperationController::new();
        let ctx = ToolContext::new(agent.clone(), controller.current());
        (agent, ctx)
    }

    struct CountingTool {
        starts: AtomicUsize,
        completes: AtomicUsize,
        executions: AtomicUsize,
    }

    impl CountingTool {
        fn new() -> Self {
            Self {
                starts: AtomicUsize::new(0),
                completes: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("counting", "Counting tool").with_parameters(json!({
                "type": "object",
                "properties": { "value": { "type": "integer" } },
                "required": ["value"]
            }))
        }

        async fn on_start(&self, _args: &Value, _ctx: &ToolContext) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_complete(&self, _args: &Value, _result: &ToolResult, _ctx: &ToolContext) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::ok("counting", json!({"value": args["value"]})))
        }
    }

    #[tokio::test]
    async fn dispatch_runs_hooks_around_execute() {
        let (_, ctx) = ctx(ProjectType::App);
        let tool = Arc::new(CountingTool::new());
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());

        let result = registry.dispatch("counting", json!({"value": 3}), &ctx).await;

        assert!(!result.is_error());
        assert_eq!(tool.starts.load(Ordering::SeqCst), 1);
        assert_eq!(tool.executions.load(Ordering::SeqCst), 1);
        assert_eq!(tool.completes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schema_failure_skips_implementation() {
        let (_, ctx) = ctx(ProjectType::App);
        let tool = Arc::new(CountingTool::new());
        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());

        let result = registry
            .dispatch("counting", json!({"value": "three"}), &ctx)
            .await;

        assert!(result.is_error());
        assert_eq!(tool.executions.load(Ordering::SeqCst), 0);
        assert_eq!(tool.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let (_, ctx) = ctx(ProjectType::App);
        let registry = ToolRegistry::new();
        let result = registry.dispatch("missing", json!({}), &ctx).await;
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("unknown tool"));
    }

    struct PanickyishTool;

    #[async_trait]
    impl Tool for PanickyishTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("fragile", "Always fails")
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed("backend unavailable".into()))
        }
    }

    #[tokio::test]
    async fn implementation_errors_become_error_results() {
        let (_, ctx) = ctx(ProjectType::App);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanickyishTool));

        let result = registry.dispatch("fragile", json!({}), &ctx).await;
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("backend unavailable"));
    }

    #[test]
    fn registry_composition_per_project_type() {
        let app = registry_for(ProjectType::App);
        assert!(app.get("alter_blueprint").is_some());
        assert!(app.get("regenerate_file").is_some());
        assert!(app.get("configure_workflow_metadata").is_none());
        assert!(app.get("web_search").is_some());

        let workflow = registry_for(ProjectType::Workflow);
        assert!(workflow.get("generate_files").is_some());
        assert!(workflow.get("configure_workflow_metadata").is_some());
        assert!(workflow.get("alter_blueprint").is_none());
        assert!(workflow.get("deep_debugger").is_some());
    }

    #[test]
    fn descriptors_expose_schemas() {
        let registry = registry_for(ProjectType::Workflow);
        let descriptors = registry.descriptors();
        let generate = descriptors
            .iter()
            .find(|d| d.name == "generate_files")
            .unwrap();
        assert!(generate.parameters["properties"]["files"].is_object());
    }
}
