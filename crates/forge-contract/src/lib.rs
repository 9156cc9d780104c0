//! Shared contracts for the forge session runtime.
//!
//! This crate carries the types every other crate agrees on: the session
//! record, conversation model, event and control-frame vocabularies, the
//! tool and plugin contracts, cancellation primitives, and the trait
//! facades for external collaborators (sandbox, inference, secrets,
//! deployment, export).

pub mod agent;
pub mod cancellation;
pub mod control;
pub mod error;
pub mod event;
pub mod external;
pub mod inference;
pub mod limits;
pub mod message;
pub mod plugin;
pub mod sandbox;
pub mod state;
pub mod tool;
pub mod workflow;

pub use agent::{AgentHandle, CommitSummary, DeepDebugOutcome, DeepDebugRequest};
pub use cancellation::{await_or_cancel, CancelAware, OperationController, OperationToken};
pub use control::ControlFrame;
pub use error::SessionError;
pub use event::SessionEvent;
pub use external::{
    CloudDeployResponse, CloudflareCredentials, DeployClient, ExportClient, ExportObject,
    GitHubPushRequest, GitHubPushResponse, GitObjectsExport, SecretsProvider, WebSearchProvider,
    PREVIEW_EXPIRED_CODE,
};
pub use limits::{is_valid_project_name, sanitize_project_name};
pub use inference::{
    is_retryable_inference_error, DeltaSender, InferenceClient, InferenceError, InferenceMessage,
    InferenceRequest, InferenceResponse, InferenceRole, ToolCallRequest,
};
pub use message::{
    gen_conversation_id, upsert_message, ConversationLogs, ConversationMessage, Role, ToolEvent,
    ToolEventStatus,
};
pub use plugin::{HookResult, PluginContext, PluginError, SessionPlugin};
pub use sandbox::{
    AnalysisResponse, CommandOutcome, ExecResponse, FilesResponse, InstanceResponse, IssueSeverity,
    LintIssue, LogsResponse, PreviewStatusResponse, RuntimeError, RuntimeErrorsResponse,
    SandboxClient, SandboxFile, SandboxResponse,
};
pub use state::{
    state_to_json, AgentMode, AppState, BaseSessionState, Blueprint, DeploymentStatus, DevState,
    FileConcept, FileRecord, GeneratedPhase, ImageAttachment, InferenceContext, PendingUserInput,
    PhaseConcept, ProjectState, ProjectType, SessionState, WorkflowState, WORKFLOW_ENTRY_PATH,
};
pub use tool::{validate_against_schema, Tool, ToolContext, ToolDescriptor, ToolError, ToolResult};
pub use workflow::{ResourceBinding, ResourceKind, WorkflowMetadata};
