//! Contract facade for the external sandbox execution service.
//!
//! Every call returns a response struct with a `success` flag and an
//! optional `error` string. No error crosses this boundary as a panic or a
//! `Result::Err`; transport failures are folded into `success: false`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A file pushed to or read from the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxFile {
    pub path: String,
    pub contents: String,
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// One static-analysis finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintIssue {
    pub file_path: String,
    pub line: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default)]
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

impl Default for IssueSeverity {
    fn default() -> Self {
        Self::Warning
    }
}

/// One captured runtime error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// Generic acknowledgement response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SandboxResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub files: Vec<SandboxFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<CommandOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub lint_issues: Vec<LintIssue>,
    #[serde(default)]
    pub type_issues: Vec<LintIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeErrorsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<RuntimeError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewStatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

/// Capability set of the sandbox service.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    async fn create_instance(&self, project_name: &str) -> InstanceResponse;

    async fn write_files(&self, instance_id: &str, files: &[SandboxFile]) -> SandboxResponse;

    async fn get_files(&self, instance_id: &str, paths: Option<&[String]>) -> FilesResponse;

    async fn execute_commands(
        &self,
        instance_id: &str,
        commands: &[String],
        timeout_secs: Option<u64>,
    ) -> ExecResponse;

    async fn get_logs(
        &self,
        instance_id: &str,
        reset: bool,
        duration_secs: Option<u64>,
    ) -> LogsResponse;

    async fn run_static_analysis(
        &self,
        instance_id: &str,
        files: Option<&[String]>,
    ) -> AnalysisResponse;

    async fn fetch_runtime_errors(&self, instance_id: &str, clear: bool) -> RuntimeErrorsResponse;

    async fn update_project_name(&self, instance_id: &str, name: &str) -> SandboxResponse;

    async fn deploy(&self, instance_id: &str) -> SandboxResponse;

    async fn preview_status(&self, instance_id: &str) -> PreviewStatusResponse;
}
