//! Outbound session events broadcast to attached client channels.

use crate::message::ConversationLogs;
use crate::sandbox::{LintIssue, RuntimeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of events a session emits.
///
/// Serialized as `{"type": "<snake_case>", ...payload}`. Order on a single
/// channel is FIFO; ordering across channels is not guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    GenerationStarted,
    GenerationCompleted,
    GenerationStopped,
    GenerationResumed,

    PhaseGenerating {
        phase_name: String,
    },
    PhaseGenerated {
        phase_name: String,
        #[serde(default)]
        files: Vec<String>,
    },
    PhaseImplementing {
        phase_name: String,
    },
    PhaseImplemented {
        phase_name: String,
    },

    FileGenerating {
        file_path: String,
    },
    FileChunkGenerated {
        file_path: String,
        chunk: String,
    },
    FileGenerated {
        file_path: String,
        #[serde(default)]
        file_purpose: String,
    },

    DeploymentStarted,
    DeploymentCompleted {
        preview_url: String,
    },
    DeploymentFailed {
        error: String,
    },

    CloudflareDeploymentStarted,
    CloudflareDeploymentCompleted {
        deployment_url: String,
    },
    CloudflareDeploymentError {
        error: String,
    },
    PreviewForceRefresh,

    RuntimeErrorFound {
        errors: Vec<RuntimeError>,
    },
    StaticAnalysisResults {
        lint_issues: Vec<LintIssue>,
        type_issues: Vec<LintIssue>,
    },

    ConversationCleared,
    ConversationState {
        #[serde(flatten)]
        logs: ConversationLogs,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deep_debug_session: Option<String>,
    },
    ModelConfigsInfo {
        configs: Value,
    },
    ProjectNameUpdated {
        project_name: String,
    },

    GithubExportStarted,
    GithubExportProgress {
        message: String,
    },
    GithubExportCompleted {
        repository_url: String,
    },
    GithubExportError {
        error: String,
    },

    TextDelta {
        delta: String,
    },
    Error {
        error: String,
    },
}

impl SessionEvent {
    /// Stable wire tag, for logging and assertions.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GenerationStarted => "generation_started",
            Self::GenerationCompleted => "generation_completed",
            Self::GenerationStopped => "generation_stopped",
            Self::GenerationResumed => "generation_resumed",
            Self::PhaseGenerating { .. } => "phase_generating",
            Self::PhaseGenerated { .. } => "phase_generated",
            Self::PhaseImplementing { .. } => "phase_implementing",
            Self::PhaseImplemented { .. } => "phase_implemented",
            Self::FileGenerating { .. } => "file_generating",
            Self::FileChunkGenerated { .. } => "file_chunk_generated",
            Self::FileGenerated { .. } => "file_generated",
            Self::DeploymentStarted => "deployment_started",
            Self::DeploymentCompleted { .. } => "deployment_completed",
            Self::DeploymentFailed { .. } => "deployment_failed",
            Self::CloudflareDeploymentStarted => "cloudflare_deployment_started",
            Self::CloudflareDeploymentCompleted { .. } => "cloudflare_deployment_completed",
            Self::CloudflareDeploymentError { .. } => "cloudflare_deployment_error",
            Self::PreviewForceRefresh => "preview_force_refresh",
            Self::RuntimeErrorFound { .. } => "runtime_error_found",
            Self::StaticAnalysisResults { .. } => "static_analysis_results",
            Self::ConversationCleared => "conversation_cleared",
            Self::ConversationState { .. } => "conversation_state",
            Self::ModelConfigsInfo { .. } => "model_configs_info",
            Self::ProjectNameUpdated { .. } => "project_name_updated",
            Self::GithubExportStarted => "github_export_started",
            Self::GithubExportProgress { .. } => "github_export_progress",
            Self::GithubExportCompleted { .. } => "github_export_completed",
            Self::GithubExportError { .. } => "github_export_error",
            Self::TextDelta { .. } => "text_delta",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let v = serde_json::to_value(SessionEvent::DeploymentCompleted {
            preview_url: "https://p.example".into(),
        })
        .unwrap();
        assert_eq!(v["type"], "deployment_completed");
        assert_eq!(v["preview_url"], "https://p.example");
    }

    #[test]
    fn event_type_matches_wire_tag() {
        let events = [
            SessionEvent::GenerationStarted,
            SessionEvent::PhaseGenerating {
                phase_name: "p".into(),
            },
            SessionEvent::Error { error: "e".into() },
        ];
        for event in events {
            let v = serde_json::to_value(&event).unwrap();
            assert_eq!(v["type"], event.event_type());
        }
    }

    #[test]
    fn conversation_state_flattens_logs() {
        let v = serde_json::to_value(SessionEvent::ConversationState {
            logs: ConversationLogs::default(),
            deep_debug_session: None,
        })
        .unwrap();
        assert_eq!(v["type"], "conversation_state");
        assert!(v["running"].as_array().unwrap().is_empty());
        assert!(v["full"].as_array().unwrap().is_empty());
    }
}
