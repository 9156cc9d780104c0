//! The trimmed agent capability set handed to tools and controllers.
//!
//! Tools and plugins never hold the session itself; they hold this
//! interface. Everything here is safe to call from inside a tool body
//! without re-entering the session's control surface.

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::sandbox::{AnalysisResponse, ExecResponse, LogsResponse, RuntimeErrorsResponse};
use crate::state::{Blueprint, FileRecord, PendingUserInput, SessionState};
use crate::workflow::WorkflowMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Summary of one version-control commit, for the safe git tool subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub message: String,
    /// Paths changed relative to the parent commit.
    #[serde(default)]
    pub changed_paths: Vec<String>,
}

/// Input to a deep-debug run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepDebugRequest {
    pub issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_transcript: Option<String>,
    /// Only files under these path prefixes are indexed.
    #[serde(default)]
    pub focus_paths: Vec<String>,
}

/// Outcome of a deep-debug run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDebugOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeepDebugOutcome {
    pub fn ok(transcript: impl Into<String>) -> Self {
        Self {
            success: true,
            transcript: Some(transcript.into()),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transcript: None,
            error: Some(message.into()),
        }
    }
}

/// Capability set callable from tools.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    fn session_id(&self) -> String;

    /// Consistent snapshot of the session record.
    async fn state(&self) -> SessionState;

    async fn broadcast(&self, event: SessionEvent);

    /// Read generated files; `None` reads the whole map.
    async fn read_files(&self, paths: Option<Vec<String>>) -> Vec<FileRecord>;

    /// Write files through the file manager (commits to the VCS store).
    async fn save_files(
        &self,
        files: Vec<FileRecord>,
        commit_message: String,
    ) -> Result<(), SessionError>;

    async fn delete_files(&self, paths: Vec<String>) -> Result<(), SessionError>;

    async fn exec_commands(&self, commands: Vec<String>) -> ExecResponse;

    async fn get_logs(&self, reset: bool) -> LogsResponse;

    /// Deploy the current file map to the sandbox; returns the preview URL.
    async fn deploy_preview(&self) -> Result<String, SessionError>;

    async fn run_static_analysis(&self) -> AnalysisResponse;

    async fn fetch_runtime_errors(&self, clear: bool) -> RuntimeErrorsResponse;

    async fn rename_project(&self, name: String) -> Result<(), SessionError>;

    /// Recent commits, newest first.
    async fn git_log(&self, limit: usize) -> Vec<CommitSummary>;

    /// Queue a user request for the next safe merge point.
    async fn queue_user_request(&self, input: PendingUserInput);

    /// Record a project-update note for the next generation step.
    async fn note_project_update(&self, note: String);

    /// Resolve once the in-flight generation (if any) finishes.
    async fn wait_for_generation(&self);

    /// Resolve once the in-flight deep-debug session (if any) finishes.
    async fn wait_for_debug(&self);

    async fn deep_debug(&self, request: DeepDebugRequest) -> DeepDebugOutcome;

    /// Patch the app blueprint. Fails with a validation error on workflow
    /// sessions.
    async fn alter_blueprint(&self, patch: Blueprint) -> Result<(), SessionError>;

    /// Regenerate a single generated file. App sessions only.
    async fn regenerate_file(&self, path: String) -> Result<FileRecord, SessionError>;

    /// Merge a metadata update and return the merged record. Workflow
    /// sessions only.
    async fn merge_workflow_metadata(
        &self,
        update: WorkflowMetadata,
    ) -> Result<WorkflowMetadata, SessionError>;

    /// External web search, when a provider is configured.
    async fn web_search(&self, query: String) -> Result<String, SessionError>;
}
