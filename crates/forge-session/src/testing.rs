//! Shared fixtures for unit and integration tests.

use async_trait::async_trait;
use forge_contract::{
    AnalysisResponse, CloudDeployResponse, CloudflareCredentials, CommandOutcome,
    DeployClient, ExecResponse, FilesResponse, GitHubPushRequest, GitHubPushResponse,
    GitObjectsExport, ExportClient, InferenceClient, InferenceError, InferenceRequest,
    InferenceResponse, InstanceResponse, LintIssue, LogsResponse, PreviewStatusResponse,
    RuntimeError, RuntimeErrorsResponse, SandboxClient, SandboxFile, SandboxResponse,
    SecretsProvider,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted sandbox: every call succeeds unless told otherwise, and all
/// interactions are recorded for assertions.
#[derive(Default)]
pub struct MockSandbox {
    pub written_files: Mutex<Vec<SandboxFile>>,
    pub executed_commands: Mutex<Vec<String>>,
    pub deploy_count: AtomicUsize,
    pub create_count: AtomicUsize,
    /// Concurrency watermark across deploy calls.
    pub max_concurrent_deploys: AtomicUsize,
    active_deploys: AtomicUsize,
    /// Artificial latency inside `deploy`, to surface overlap.
    pub deploy_delay: Mutex<Option<Duration>>,
    pub scripted_runtime_errors: Mutex<VecDeque<RuntimeErrorsResponse>>,
    pub scripted_analysis: Mutex<VecDeque<AnalysisResponse>>,
    pub sandbox_files: Mutex<Vec<SandboxFile>>,
    pub logs: Mutex<String>,
    pub fail_writes: Mutex<bool>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_runtime_errors(&self, errors: Vec<RuntimeError>) {
        self.scripted_runtime_errors
            .lock()
            .unwrap()
            .push_back(RuntimeErrorsResponse {
                success: true,
                error: None,
                errors,
            });
    }

    pub fn push_failed_runtime_errors(&self) {
        self.scripted_runtime_errors
            .lock()
            .unwrap()
            .push_back(RuntimeErrorsResponse {
                success: false,
                error: Some("runtime error channel unavailable".into()),
                errors: Vec::new(),
            });
    }

    pub fn push_analysis(&self, lint_issues: Vec<LintIssue>) {
        self.scripted_analysis
            .lock()
            .unwrap()
            .push_back(AnalysisResponse {
                success: true,
                error: None,
                lint_issues,
                type_issues: Vec::new(),
            });
    }

    pub fn set_sandbox_file(&self, path: &str, contents: &str) {
        let mut files = self.sandbox_files.lock().unwrap();
        files.retain(|f| f.path != path);
        files.push(SandboxFile {
            path: path.to_string(),
            contents: contents.to_string(),
        });
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.written_files
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.path.clone())
            .collect()
    }
}

#[async_trait]
impl SandboxClient for MockSandbox {
    async fn create_instance(&self, project_name: &str) -> InstanceResponse {
        let n = self.create_count.fetch_add(1, Ordering::SeqCst);
        InstanceResponse {
            success: true,
            error: None,
            instance_id: Some(format!("sbx-{project_name}-{n}")),
        }
    }

    async fn write_files(&self, _instance_id: &str, files: &[SandboxFile]) -> SandboxResponse {
        if *self.fail_writes.lock().unwrap() {
            return SandboxResponse::err("write rejected");
        }
        self.written_files.lock().unwrap().extend_from_slice(files);
        SandboxResponse::ok()
    }

    async fn get_files(&self, _instance_id: &str, paths: Option<&[String]>) -> FilesResponse {
        let files = self.sandbox_files.lock().unwrap().clone();
        let files = match paths {
            Some(paths) => files
                .into_iter()
                .filter(|f| paths.contains(&f.path))
                .collect(),
            None => files,
        };
        FilesResponse {
            success: true,
            error: None,
            files,
        }
    }

    async fn execute_commands(
        &self,
        _instance_id: &str,
        commands: &[String],
        _timeout_secs: Option<u64>,
    ) -> ExecResponse {
        self.executed_commands
            .lock()
            .unwrap()
            .extend(commands.iter().cloned());
        ExecResponse {
            success: true,
            error: None,
            outcomes: commands
                .iter()
                .map(|c| CommandOutcome {
                    command: c.clone(),
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
                .collect(),
        }
    }

    async fn get_logs(
        &self,
        _instance_id: &str,
        reset: bool,
        _duration_secs: Option<u64>,
    ) -> LogsResponse {
        let mut logs = self.logs.lock().unwrap();
        let out = logs.clone();
        if reset {
            logs.clear();
        }
        LogsResponse {
            success: true,
            error: None,
            logs: out,
        }
    }

    async fn run_static_analysis(
        &self,
        _instance_id: &str,
        _files: Option<&[String]>,
    ) -> AnalysisResponse {
        self.scripted_analysis
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AnalysisResponse {
                success: true,
                error: None,
                lint_issues: Vec::new(),
                type_issues: Vec::new(),
            })
    }

    async fn fetch_runtime_errors(&self, _instance_id: &str, _clear: bool) -> RuntimeErrorsResponse {
        self.scripted_runtime_errors
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RuntimeErrorsResponse {
                success: true,
                error: None,
                errors: Vec::new(),
            })
    }

    async fn update_project_name(&self, _instance_id: &str, _name: &str) -> SandboxResponse {
        SandboxResponse::ok()
    }

    async fn deploy(&self, _instance_id: &str) -> SandboxResponse {
        let active = self.active_deploys.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_deploys
            .fetch_max(active, Ordering::SeqCst);
        let delay = *self.deploy_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active_deploys.fetch_sub(1, Ordering::SeqCst);
        self.deploy_count.fetch_add(1, Ordering::SeqCst);
        SandboxResponse::ok()
    }

    async fn preview_status(&self, instance_id: &str) -> PreviewStatusResponse {
        PreviewStatusResponse {
            success: true,
            error: None,
            ready: true,
            preview_url: Some(format!("https://{instance_id}.preview.test")),
        }
    }
}

/// Scripted inference: pops queued responses, then settles on a plain
/// completion with no tool calls.
#[derive(Default)]
pub struct ScriptedInference {
    responses: Mutex<VecDeque<InferenceResponse>>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(InferenceResponse {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
        });
    }

    pub fn push_response(&self, response: InferenceResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn execute(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(InferenceResponse {
                text: Some("done".into()),
                tool_calls: Vec::new(),
            }))
    }
}

/// Secrets provider with zero or one stored credential set.
#[derive(Default)]
pub struct StaticSecrets {
    credentials: Option<CloudflareCredentials>,
}

impl StaticSecrets {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_credentials(account_id: &str, api_token: &str) -> Self {
        Self {
            credentials: Some(CloudflareCredentials {
                account_id: account_id.to_string(),
                api_token: api_token.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SecretsProvider for StaticSecrets {
    async fn cloudflare_credentials(&self, _user_id: &str) -> Option<CloudflareCredentials> {
        self.credentials.clone()
    }
}

/// Scripted external deployment client.
#[derive(Default)]
pub struct MockDeployClient {
    responses: Mutex<VecDeque<CloudDeployResponse>>,
    pub deploy_count: AtomicUsize,
}

impl MockDeployClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: CloudDeployResponse) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl DeployClient for MockDeployClient {
    async fn deploy(
        &self,
        project_name: &str,
        _instance_id: &str,
        _credentials: &CloudflareCredentials,
    ) -> CloudDeployResponse {
        self.deploy_count.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CloudDeployResponse {
                success: true,
                deployment_url: Some(format!("https://{project_name}.workers.test")),
                error: None,
                error_code: None,
            })
    }
}

/// Export client that accepts every push.
#[derive(Default)]
pub struct MockExportClient {
    pub pushes: Mutex<Vec<GitHubPushRequest>>,
}

#[async_trait]
impl ExportClient for MockExportClient {
    async fn push(
        &self,
        request: &GitHubPushRequest,
        _export: &GitObjectsExport,
    ) -> GitHubPushResponse {
        self.pushes.lock().unwrap().push(request.clone());
        GitHubPushResponse {
            success: true,
            repository_url: Some(format!(
                "https://github.example/{}",
                request.repository_name
            )),
            error: None,
        }
    }
}

/// Recording [`forge_contract::AgentHandle`] for tool unit tests.
pub struct StubAgent {
    pub state: Mutex<forge_contract::SessionState>,
    pub events: Mutex<Vec<forge_contract::SessionEvent>>,
    pub saved_commits: Mutex<Vec<(Vec<forge_contract::FileRecord>, String)>>,
    pub web_results: Mutex<Option<String>>,
    pub log_lines: Mutex<String>,
}

impl StubAgent {
    pub fn new(project_type: forge_contract::ProjectType) -> Self {
        let mut state = forge_contract::SessionState::initial(project_type);
        state.base.session_id = "sess-test".into();
        state.base.project_name = "stub-project".into();
        Self {
            state: Mutex::new(state),
            events: Mutex::new(Vec::new()),
            saved_commits: Mutex::new(Vec::new()),
            web_results: Mutex::new(Some("no results".into())),
            log_lines: Mutex::new("boot ok".into()),
        }
    }

    pub fn event_tags(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }
}

#[async_trait]
impl forge_contract::AgentHandle for StubAgent {
    fn session_id(&self) -> String {
        "sess-test".into()
    }

    async fn state(&self) -> forge_contract::SessionState {
        self.state.lock().unwrap().clone()
    }

    async fn broadcast(&self, event: forge_contract::SessionEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn read_files(&self, paths: Option<Vec<String>>) -> Vec<forge_contract::FileRecord> {
        let state = self.state.lock().unwrap();
        state
            .base
            .generated_files
            .values()
            .filter(|f| match &paths {
                Some(paths) => paths.contains(&f.file_path),
                None => true,
            })
            .cloned()
            .collect()
    }

    async fn save_files(
        &self,
        files: Vec<forge_contract::FileRecord>,
        commit_message: String,
    ) -> Result<(), forge_contract::SessionError> {
        let mut state = self.state.lock().unwrap();
        for file in &files {
            state
                .base
                .generated_files
                .insert(file.file_path.clone(), file.clone());
        }
        self.saved_commits.lock().unwrap().push((files, commit_message));
        Ok(())
    }

    async fn delete_files(&self, paths: Vec<String>) -> Result<(), forge_contract::SessionError> {
        let mut state = self.state.lock().unwrap();
        for path in paths {
            state.base.generated_files.remove(&path);
        }
        Ok(())
    }

    async fn exec_commands(&self, commands: Vec<String>) -> ExecResponse {
        ExecResponse {
            success: true,
            error: None,
            outcomes: commands
                .into_iter()
                .map(|command| CommandOutcome {
                    command,
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
                .collect(),
        }
    }

    async fn get_logs(&self, _reset: bool) -> LogsResponse {
        LogsResponse {
            success: true,
            error: None,
            logs: self.log_lines.lock().unwrap().clone(),
        }
    }

    async fn deploy_preview(&self) -> Result<String, forge_contract::SessionError> {
        Ok("https://stub.preview.test".into())
    }

    async fn run_static_analysis(&self) -> AnalysisResponse {
        AnalysisResponse {
            success: true,
            ..Default::default()
        }
    }

    async fn fetch_runtime_errors(&self, _clear: bool) -> RuntimeErrorsResponse {
        RuntimeErrorsResponse {
            success: true,
            ..Default::default()
        }
    }

    async fn rename_project(&self, name: String) -> Result<(), forge_contract::SessionError> {
        if !forge_contract::limits::is_valid_project_name(&name) {
            return Err(forge_contract::SessionError::Validation(format!(
                "invalid project name: {name}"
            )));
        }
        self.state.lock().unwrap().base.project_name = name;
        Ok(())
    }

    async fn git_log(&self, _limit: usize) -> Vec<forge_contract::CommitSummary> {
        vec![forge_contract::CommitSummary {
            hash: "deadbeef".into(),
            message: "initial scaffold".into(),
            changed_paths: vec!["src/main.tsx".into()],
        }]
    }

    async fn queue_user_request(&self, input: forge_contract::PendingUserInput) {
        self.state.lock().unwrap().base.pending_user_inputs.push(input);
    }

    async fn note_project_update(&self, note: String) {
        self.state.lock().unwrap().base.project_updates.push(note);
    }

    async fn wait_for_generation(&self) {}

    async fn wait_for_debug(&self) {}

    async fn deep_debug(
        &self,
        request: forge_contract::DeepDebugRequest,
    ) -> forge_contract::DeepDebugOutcome {
        forge_contract::DeepDebugOutcome::ok(format!("diagnosed: {}", request.issue))
    }

    async fn alter_blueprint(
        &self,
        patch: forge_contract::Blueprint,
    ) -> Result<(), forge_contract::SessionError> {
        let mut state = self.state.lock().unwrap();
        match state.as_app_mut() {
            Some(app) => {
                app.blueprint = Some(patch);
                Ok(())
            }
            None => Err(forge_contract::SessionError::Validation(
                "blueprint is only available for app sessions".into(),
            )),
        }
    }

    async fn regenerate_file(
        &self,
        path: String,
    ) -> Result<forge_contract::FileRecord, forge_contract::SessionError> {
        let state = self.state.lock().unwrap();
        state
            .base
            .generated_files
            .get(&path)
            .cloned()
            .ok_or_else(|| forge_contract::SessionError::Validation(format!("unknown file: {path}")))
    }

    async fn merge_workflow_metadata(
        &self,
        update: forge_contract::WorkflowMetadata,
    ) -> Result<forge_contract::WorkflowMetadata, forge_contract::SessionError> {
        let mut state = self.state.lock().unwrap();
        match state.as_workflow_mut() {
            Some(wf) => {
                let mut merged = wf.workflow_metadata.clone().unwrap_or_default();
                merged.merge(update);
                wf.workflow_metadata = Some(merged.clone());
                Ok(merged)
            }
            None => Err(forge_contract::SessionError::Validation(
                "workflow metadata is only available for workflow sessions".into(),
            )),
        }
    }

    async fn web_search(&self, query: String) -> Result<String, forge_contract::SessionError> {
        match self.web_results.lock().unwrap().clone() {
            Some(results) => Ok(format!("{query}: {results}")),
            None => Err(forge_contract::SessionError::Internal(
                "search provider not configured".into(),
            )),
        }
    }
}

/// Drain every frame currently queued on an event channel.
pub fn drain_events(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(&frame).expect("event frames are valid JSON"));
    }
    out
}

/// Event tags in arrival order.
pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or("?").to_string())
        .collect()
}
