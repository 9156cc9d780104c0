//! Conversation model: messages, roles, and the two-log view.
//!
//! Every message carries a unique `conversation_id`. Both logs (full and
//! running) dedup by that id: adding an existing id updates in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generate a unique conversation message id (UUIDv7, simple format).
pub fn gen_conversation_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool activity attached to a message for client rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub name: String,
    pub status: ToolEventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEventStatus {
    Start,
    Success,
    Error,
}

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique id; upserts key on this.
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Optional presentational payload passed through to clients untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_events: Option<Vec<ToolEvent>>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id: gen_conversation_id(),
            role,
            content: content.into(),
            ui: None,
            tool_events: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = id.into();
        self
    }

    #[must_use]
    pub fn with_ui(mut self, ui: Value) -> Self {
        self.ui = Some(ui);
        self
    }

    #[must_use]
    pub fn with_tool_events(mut self, events: Vec<ToolEvent>) -> Self {
        self.tool_events = Some(events);
        self
    }
}

/// Upsert `msg` into `log` by `conversation_id`.
///
/// Returns `true` when the message was appended, `false` when an existing
/// entry was updated in place.
pub fn upsert_message(log: &mut Vec<ConversationMessage>, msg: ConversationMessage) -> bool {
    if let Some(existing) = log
        .iter_mut()
        .find(|m| m.conversation_id == msg.conversation_id)
    {
        *existing = msg;
        false
    } else {
        log.push(msg);
        true
    }
}

/// The two parallel logs of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLogs {
    /// Compacted working memory.
    pub running: Vec<ConversationMessage>,
    /// Append-only audit log.
    pub full: Vec<ConversationMessage>,
}
