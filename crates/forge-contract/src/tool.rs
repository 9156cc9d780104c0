//! Tool contract: named, schema-validated functions exposed to the LLM.

use crate::agent::AgentHandle;
use crate::cancellation::OperationToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result of a tool invocation.
///
/// Either a success payload or an error string; tools never throw across
/// the dispatch boundary. Error results are returned verbatim to the LLM,
/// which decides recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            data: data.into(),
            error: None,
        }
    }

    pub fn error(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            data: Value::Null,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The wire shape fed back to the LLM: the payload itself on success,
    /// `{"error": ...}` on failure.
    pub fn to_llm_json(&self) -> Value {
        match &self.error {
            Some(message) => serde_json::json!({ "error": message }),
            None => self.data.clone(),
        }
    }
}

/// Failures internal to a tool implementation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Tool metadata exposed to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (snake_case).
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }
}

/// Execution context handed to every tool call.
///
/// Carries the trimmed agent capability set rather than the session itself,
/// plus the current operation token so tool bodies stay cancel-aware.
#[derive(Clone)]
pub struct ToolContext {
    pub agent: Arc<dyn AgentHandle>,
    pub token: OperationToken,
    /// Set when the dispatching dialogue IS the in-flight generation, so
    /// tools that await generation do not wait on themselves.
    pub in_generation: bool,
}

impl ToolContext {
    pub fn new(agent: Arc<dyn AgentHandle>, token: OperationToken) -> Self {
        Self {
            agent,
            token,
            in_generation: false,
        }
    }

    #[must_use]
    pub fn in_generation(mut self) -> Self {
        self.in_generation = true;
        self
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.agent.session_id())
            .finish()
    }
}

/// A named tool function.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Validate raw arguments against the descriptor schema.
    fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        validate_against_schema(&self.descriptor().parameters, args)
    }

    /// Invoked by the dispatcher before `execute`.
    async fn on_start(&self, _args: &Value, _ctx: &ToolContext) {}

    /// Invoked by the dispatcher after `execute`, with the final result.
    async fn on_complete(&self, _args: &Value, _result: &ToolResult, _ctx: &ToolContext) {}

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}

/// Validate a JSON value against a JSON Schema.
pub fn validate_against_schema(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::Validator::new(schema)
        .map_err(|e| ToolError::Internal(format!("invalid tool schema: {e}")))?;
    if validator.is_valid(args) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    Err(ToolError::InvalidArguments(errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_result_serializes_payload() {
        let result = ToolResult::ok("get_logs", json!({"logs": "ok"}));
        assert!(!result.is_error());
        assert_eq!(result.to_llm_json(), json!({"logs": "ok"}));
    }

    #[test]
    fn error_result_serializes_error_object() {
        let result = ToolResult::error("deploy_preview", "sandbox unavailable");
        assert!(result.is_error());
        assert_eq!(
            result.to_llm_json(),
            json!({"error": "sandbox unavailable"})
        );
    }

    #[test]
    fn validate_accepts_conforming_args() {
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });
        assert!(validate_against_schema(&schema, &json!({"name": "x"})).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });
        let err = validate_against_schema(&schema, &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn validate_rejects_wrong_type_and_joins_errors() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "name": { "type": "string" }
            },
            "required": ["count", "name"]
        });
        let err = validate_against_schema(&schema, &json!({})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("count"), "missing count in: {msg}");
        assert!(msg.contains("name"), "missing name in: {msg}");
    }

    #[test]
    fn invalid_schema_is_internal_error() {
        let err = validate_against_schema(&json!({"type": 7}), &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
    }

    #[test]
    fn descriptor_defaults_to_empty_object_schema() {
        let desc = ToolDescriptor::new("web_search", "Search the web");
        assert_eq!(
            desc.parameters,
            json!({"type": "object", "properties": {}})
        );
    }
}
