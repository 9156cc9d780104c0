//! The inference-call contract.
//!
//! The core never speaks a provider protocol directly; it hands an
//! [`InferenceRequest`] to an [`InferenceClient`] and gets back text and/or
//! tool-call requests. Streamed variants push text deltas through a channel
//! as they arrive.

use crate::tool::ToolDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One message in the inference context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceMessage {
    pub role: InferenceRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// Set on tool-role messages: the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl InferenceMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: InferenceRole::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: InferenceRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: InferenceRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: InferenceRole::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: InferenceRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// One inference call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub messages: Vec<InferenceMessage>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// The model's reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("inference transport: {0}")]
    Transport(String),

    #[error("inference provider: {0}")]
    Provider(String),

    /// All retry attempts failed; carries the last underlying error.
    #[error("inference exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// Sender for streamed text deltas. Dropped when the stream ends.
pub type DeltaSender = mpsc::UnboundedSender<String>;

/// Inference backend contract.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Run one inference call to completion.
    async fn execute(&self, request: InferenceRequest)
        -> Result<InferenceResponse, InferenceError>;

    /// Run one inference call, pushing text deltas through `deltas` as they
    /// arrive. The final response still carries the assembled text.
    async fn execute_stream(
        &self,
        request: InferenceRequest,
        deltas: DeltaSender,
    ) -> Result<InferenceResponse, InferenceError> {
        let response = self.execute(request).await?;
        if let Some(text) = &response.text {
            let _ = deltas.send(text.clone());
        }
        Ok(response)
    }
}

/// Whether a provider error message looks transient enough to retry.
pub fn is_retryable_inference_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    let non_retryable = [
        "401",
        "403",
        "404",
        "400",
        "422",
        "unauthorized",
        "forbidden",
        "invalid api key",
        "invalid_request",
        "bad request",
    ];
    if non_retryable.iter().any(|p| lower.contains(p)) {
        return false;
    }
    let retryable = [
        "429",
        "too many requests",
        "rate limit",
        "timeout",
        "timed out",
        "temporar",
        "connection",
        "network",
        "unavailable",
        "server error",
        "502",
        "503",
        "504",
        "reset by peer",
        "eof",
    ];
    retryable.iter().any(|p| lower.contains(p))
}
