//! The authoritative session record.
//!
//! A session is a tagged variant: the common base plus either the phasic
//! app extension or the workflow extension, selected at creation and
//! immutable thereafter.

use crate::limits::MAX_COMMANDS_HISTORY;
use crate::message::ConversationMessage;
use crate::workflow::WorkflowMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Project variant, chosen at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    App,
    Workflow,
}

/// Generation behavior selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Deterministic,
    Smart,
}

impl Default for AgentMode {
    fn default() -> Self {
        Self::Deterministic
    }
}

/// App generation state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevState {
    Idle,
    PhaseGenerating,
    PhaseImplementing,
    Reviewing,
    Finalizing,
}

impl Default for DevState {
    fn default() -> Self {
        Self::Idle
    }
}

/// One generated file tracked in the session map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_path: String,
    pub file_contents: String,
    #[serde(default)]
    pub file_purpose: String,
    #[serde(default)]
    pub last_diff: String,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_path: path.into(),
            file_contents: contents.into(),
            file_purpose: String::new(),
            last_diff: String::new(),
        }
    }

    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.file_purpose = purpose.into();
        self
    }
}

/// A file planned for a phase, before it has contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConcept {
    pub path: String,
    #[serde(default)]
    pub purpose: String,
}

/// One planned unit of app generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConcept {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<FileConcept>,
    /// Set when the planner decides no further phases are needed.
    #[serde(default)]
    pub last_phase: bool,
}

/// A phase record with its completion flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPhase {
    #[serde(flatten)]
    pub concept: PhaseConcept,
    pub completed: bool,
}

/// Structured project plan for app sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub phases: Vec<PhaseConcept>,
}

/// Identity carried into every inference call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceContext {
    pub user_id: String,
    pub agent_id: String,
}

/// An image attached to a user suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub size_bytes: usize,
    /// Base64 payload; opaque to the core.
    pub data: String,
}

/// A user input waiting for a safe merge point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUserInput {
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

/// Fields common to both project variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseSessionState {
    pub project_name: String,
    /// The original natural-language request.
    pub query: String,
    pub session_id: String,
    pub hostname: String,
    pub template_name: String,
    /// The compact message log. The full log lives in the conversation store.
    #[serde(default)]
    pub conversation: Vec<ConversationMessage>,
    #[serde(default)]
    pub inference_context: InferenceContext,
    /// Client intent: generation should be running.
    #[serde(default)]
    pub should_be_generating: bool,
    #[serde(default)]
    pub agent_mode: AgentMode,
    /// Relative path -> generated file record.
    #[serde(default)]
    pub generated_files: BTreeMap<String, FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_instance_id: Option<String>,
    /// Ordered, deduplicated bootstrap commands.
    #[serde(default)]
    pub commands_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_package_json: Option<String>,
    /// User inputs queued for the next safe merge point.
    #[serde(default)]
    pub pending_user_inputs: Vec<PendingUserInput>,
    /// Accumulated project-update notes from tools.
    #[serde(default)]
    pub project_updates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deep_debug_transcript: Option<String>,
}

/// App-variant extension fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<Blueprint>,
    #[serde(default)]
    pub generated_phases: Vec<GeneratedPhase>,
    #[serde(default)]
    pub mvp_generated: bool,
    #[serde(default)]
    pub reviewing_initiated: bool,
    #[serde(default)]
    pub phases_counter: u32,
    #[serde(default)]
    pub current_dev_state: DevState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<PhaseConcept>,
    #[serde(default)]
    pub review_cycles: u32,
}

/// External deployment status for workflow sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Idle,
    Deploying,
    Deployed,
    Failed,
}

impl Default for DeploymentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Workflow-variant extension fields.
///
/// Workflow code is never stored here: it is always derived from the
/// `src/index.ts` entry of the generated file map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_metadata: Option<WorkflowMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default)]
    pub deployment_status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_error: Option<String>,
}

/// Variant-specific state, tagged by project type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "project_type", rename_all = "snake_case")]
pub enum ProjectState {
    App(AppState),
    Workflow(WorkflowState),
}

/// The single authoritative session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(flatten)]
    pub base: BaseSessionState,
    #[serde(flatten)]
    pub project: ProjectState,
}

/// Relative path of the derived workflow entry file.
pub const WORKFLOW_ENTRY_PATH: &str = "src/index.ts";

impl SessionState {
    /// A fresh record for the given variant; identity fields are filled by
    /// session initialization.
    pub fn initial(project_type: ProjectType) -> Self {
        let project = match project_type {
            ProjectType::App => ProjectState::App(AppState::default()),
            ProjectType::Workflow => ProjectState::Workflow(WorkflowState::default()),
        };
        Self {
            base: BaseSessionState::default(),
            project,
        }
    }

    pub fn project_type(&self) -> ProjectType {
        match self.project {
            ProjectState::App(_) => ProjectType::App,
            ProjectState::Workflow(_) => ProjectType::Workflow,
        }
    }

    pub fn as_app(&self) -> Option<&AppState> {
        match &self.project {
            ProjectState::App(app) => Some(app),
            ProjectState::Workflow(_) => None,
        }
    }

    pub fn as_app_mut(&mut self) -> Option<&mut AppState> {
        match &mut self.project {
            ProjectState::App(app) => Some(app),
            ProjectState::Workflow(_) => None,
        }
    }

    pub fn as_workflow(&self) -> Option<&WorkflowState> {
        match &self.project {
            ProjectState::Workflow(wf) => Some(wf),
            ProjectState::App(_) => None,
        }
    }

    pub fn as_workflow_mut(&mut self) -> Option<&mut WorkflowState> {
        match &mut self.project {
            ProjectState::Workflow(wf) => Some(wf),
            ProjectState::App(_) => None,
        }
    }

    /// The workflow entry source, derived from the file map.
    pub fn workflow_code(&self) -> Option<&str> {
        self.base
            .generated_files
            .get(WORKFLOW_ENTRY_PATH)
            .map(|f| f.file_contents.as_str())
    }

    /// Append a bootstrap command, deduplicating and keeping the history
    /// bounded to the most recent entries.
    pub fn push_command(&mut self, command: impl Into<String>) {
        let command = command.into();
        self.base.commands_history.retain(|c| c != &command);
        self.base.commands_history.push(command);
        let len = self.base.commands_history.len();
        if len > MAX_COMMANDS_HISTORY {
            self.base.commands_history.drain(..len - MAX_COMMANDS_HISTORY);
        }
    }
}

/// Opaque state snapshot for plugin hooks and exports.
pub fn state_to_json(state: &SessionState) -> Value {
    serde_json::to_value(state).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_matches_project_type() {
        let app = SessionState::initial(ProjectType::App);
        assert_eq!(app.project_type(), ProjectType::App);
        assert!(app.as_app().is_some());
        assert!(app.as_workflow().is_none());

        let wf = SessionState::initial(ProjectType::Workflow);
        assert_eq!(wf.project_type(), ProjectType::Workflow);
        assert!(wf.as_workflow().is_some());
    }

    #[test]
    fn state_round_trips_with_variant_tag() {
        let mut state = SessionState::initial(ProjectType::Workflow);
        state.base.project_name = "demo-wf".into();
        state
            .base
            .generated_files
            .insert(WORKFLOW_ENTRY_PATH.into(), FileRecord::new(WORKFLOW_ENTRY_PATH, "export {}"));
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["project_type"], "workflow");
        let parsed: SessionState = serde_json::from_value(v).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn workflow_code_is_derived_from_file_map() {
        let mut state = SessionState::initial(ProjectType::Workflow);
        assert!(state.workflow_code().is_none());
        state.base.generated_files.insert(
            WORKFLOW_ENTRY_PATH.into(),
            FileRecord::new(WORKFLOW_ENTRY_PATH, "export class W {}"),
        );
        assert_eq!(state.workflow_code(), Some("export class W {}"));
    }

    #[test]
    fn push_command_dedups_and_caps() {
        let mut state = SessionState::initial(ProjectType::App);
        for i in 0..15 {
            state.push_command(format!("cmd-{i}"));
        }
        assert_eq!(state.base.commands_history.len(), MAX_COMMANDS_HISTORY);
        assert_eq!(state.base.commands_history[0], "cmd-5");

        state.push_command("cmd-7");
        assert_eq!(state.base.commands_history.len(), MAX_COMMANDS_HISTORY);
        assert_eq!(state.base.commands_history.last().unwrap(), "cmd-7");
        assert_eq!(
            state
                .base
                .commands_history
                .iter()
                .filter(|c| *c == "cmd-7")
                .count(),
            1
        );
    }

    #[test]
    fn dev_state_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&DevState::PhaseImplementing).unwrap(),
            "\"PHASE_IMPLEMENTING\""
        );
    }
}
