//! The per-session agent (C13 routing + C16 lifecycle + capability surface).
//!
//! One `SessionAgent` is one stateful actor bound to a durable id. It owns
//! its state record, conversation rows, VCS store, and event bus; clients
//! hold channels on the bus and a control surface, never the agent itself.

use crate::controllers::{controller_for, ProjectController};
use crate::debug::DeepDebugAssistant;
use crate::deploy::{DeployHooks, DeploymentManager, SandboxDeployArgs};
use crate::events::EventBus;
use crate::files::FileManager;
use crate::inference::model_configs;
use crate::plugins::PluginManager;
use crate::scaffold::{ScaffoldProvider, TemplateScaffold, WorkflowScaffoldRequest};
use crate::state::StateStore;
use crate::storage::{ConversationManager, ConversationStore};
use crate::tools::{registry_for, ToolRegistry};
use async_trait::async_trait;
use forge_contract::limits::{is_valid_project_name, sanitize_project_name};
use forge_contract::{
    AgentHandle, AgentMode, AnalysisResponse, Blueprint, CommitSummary, DeepDebugOutcome,
    DeepDebugRequest, DeployClient, ExecResponse, ExportClient, FileRecord, GitObjectsExport,
    InferenceClient, InferenceContext, InferenceMessage, InferenceRequest, LogsResponse,
    OperationController, PendingUserInput, PluginContext, ProjectType, RuntimeErrorsResponse,
    SandboxClient, SecretsProvider, SessionError, SessionEvent, SessionState, WebSearchProvider,
    WorkflowMetadata,
};
use forge_vcs::ObjectStore;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Wiring for a new session agent.
pub struct SessionConfig {
    pub session_id: Option<String>,
    pub project_type: ProjectType,
    pub sandbox: Arc<dyn SandboxClient>,
    pub inference: Arc<dyn InferenceClient>,
    pub conversation_store: Arc<dyn ConversationStore>,
    pub scaffold: Arc<dyn ScaffoldProvider>,
    pub secrets: Option<Arc<dyn SecretsProvider>>,
    pub deploy_client: Option<Arc<dyn DeployClient>>,
    pub export_client: Option<Arc<dyn ExportClient>>,
    pub web_search: Option<Arc<dyn WebSearchProvider>>,
}

impl SessionConfig {
    pub fn new(
        project_type: ProjectType,
        sandbox: Arc<dyn SandboxClient>,
        inference: Arc<dyn InferenceClient>,
        conversation_store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            session_id: None,
            project_type,
            sandbox,
            inference,
            conversation_store,
            scaffold: Arc::new(TemplateScaffold),
            secrets: None,
            deploy_client: None,
            export_client: None,
            web_search: None,
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretsProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    #[must_use]
    pub fn with_deploy_client(mut self, client: Arc<dyn DeployClient>) -> Self {
        self.deploy_client = Some(client);
        self
    }

    #[must_use]
    pub fn with_export_client(mut self, client: Arc<dyn ExportClient>) -> Self {
        self.export_client = Some(client);
        self
    }

    #[must_use]
    pub fn with_web_search(mut self, provider: Arc<dyn WebSearchProvider>) -> Self {
        self.web_search = Some(provider);
        self
    }

    #[must_use]
    pub fn with_scaffold(mut self, scaffold: Arc<dyn ScaffoldProvider>) -> Self {
        self.scaffold = scaffold;
        self
    }
}

/// Arguments to session initialization.
#[derive(Debug, Clone, Default)]
pub struct InitializeArgs {
    pub query: String,
    pub hostname: String,
    pub user_id: String,
    pub agent_id: String,
    pub template_name: String,
    pub agent_mode: AgentMode,
}

pub struct SessionAgent {
    self_ref: Weak<SessionAgent>,
    pub(crate) session_id: String,
    pub(crate) project_type: ProjectType,
    pub(crate) state: Arc<StateStore>,
    pub(crate) conversation: ConversationManager,
    pub(crate) vcs: Arc<Mutex<ObjectStore>>,
    pub(crate) files: Arc<FileManager>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) cancellation: OperationController,
    pub(crate) deploy: Arc<DeploymentManager>,
    pub(crate) inference: Arc<dyn InferenceClient>,
    pub(crate) sandbox: Arc<dyn SandboxClient>,
    pub(crate) scaffold: Arc<dyn ScaffoldProvider>,
    pub(crate) plugins: PluginManager,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) debug: DeepDebugAssistant,
    export_client: Option<Arc<dyn ExportClient>>,
    web_search: Option<Arc<dyn WebSearchProvider>>,
    controller: RwLock<Option<Arc<dyn ProjectController>>>,
    deferred_start: AtomicBool,
    generation_active: watch::Sender<bool>,
    scaffold_entries: Mutex<Vec<String>>,
}

impl SessionAgent {
    pub fn new(config: SessionConfig) -> Arc<Self> {
        let session_id = config
            .session_id
            .unwrap_or_else(|| Uuid::now_v7().simple().to_string());
        let state = Arc::new(StateStore::new(SessionState::initial(config.project_type)));
        let mut store = ObjectStore::new();
        store.init();
        let vcs = Arc::new(Mutex::new(store));
        let files = Arc::new(FileManager::new(state.clone(), vcs.clone()));
        let deploy = Arc::new(DeploymentManager::new(
            state.clone(),
            files.clone(),
            config.sandbox.clone(),
            config.secrets.clone(),
            config.deploy_client.clone(),
        ));
        let conversation = ConversationManager::new(
            session_id.clone(),
            state.clone(),
            config.conversation_store,
        );
        let (generation_active, _) = watch::channel(false);

        let agent = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            session_id,
            project_type: config.project_type,
            state,
            conversation,
            vcs,
            files,
            events: Arc::new(EventBus::new()),
            cancellation: OperationController::new(),
            deploy,
            inference: config.inference,
            sandbox: config.sandbox,
            scaffold: config.scaffold,
            plugins: PluginManager::new(),
            tools: Arc::new(registry_for(config.project_type)),
            debug: DeepDebugAssistant::new(),
            export_client: config.export_client,
            web_search: config.web_search,
            controller: RwLock::new(None),
            deferred_start: AtomicBool::new(false),
            generation_active,
            scaffold_entries: Mutex::new(Vec::new()),
        });
        // Wire the controller eagerly; the deferred-start slot only matters
        // when a start frame races rehydration.
        agent.attach_controller(controller_for(config.project_type));
        agent
    }

    fn arc(&self) -> Arc<SessionAgent> {
        self.self_ref
            .upgrade()
            .expect("session agent dropped while in use")
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn project_type(&self) -> ProjectType {
        self.project_type
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn state_snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn conversation(&self) -> &ConversationManager {
        &self.conversation
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub async fn register_plugin(&self, plugin: Arc<dyn forge_contract::SessionPlugin>) {
        self.plugins.register(&self.plugin_ctx(), plugin).await;
    }

    pub async fn unregister_plugin(&self, name: &str) {
        self.plugins.unregister(&self.plugin_ctx(), name).await;
    }

    pub(crate) fn controller(&self) -> Option<Arc<dyn ProjectController>> {
        self.controller
            .read()
            .expect("controller lock poisoned")
            .clone()
    }

    /// Attach the project-type controller, replaying a deferred start.
    pub(crate) fn attach_controller(self: &Arc<Self>, controller: Arc<dyn ProjectController>) {
        *self.controller.write().expect("controller lock poisoned") = Some(controller);
        if self.deferred_start.swap(false, Ordering::SeqCst) {
            let me = self.arc();
            tokio::spawn(async move {
                let _ = me.start_generation().await;
            });
        }
    }

    pub(crate) fn plugin_ctx(&self) -> PluginContext {
        self.state.read(|s| PluginContext {
            session_id: s.base.session_id.clone(),
            agent_id: s.base.inference_context.agent_id.clone(),
            project_name: s.base.project_name.clone(),
        })
    }

    pub fn broadcast(&self, event: SessionEvent) {
        self.events.broadcast(&event);
    }

    /// Apply a state mutation and let `on_state_update` hooks observe it.
    pub async fn mutate<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let old = self.state.snapshot();
        let mut out = None;
        let new = self.state.update(|s| {
            out = Some(f(s));
        });
        self.plugins
            .on_state_update(&self.plugin_ctx(), &old, &new)
            .await;
        out.expect("mutation closure always runs")
    }

    /// Initialize a fresh session (C16).
    pub async fn initialize(
        self: &Arc<Self>,
        args: InitializeArgs,
    ) -> Result<SessionState, SessionError> {
        info!(
            agent_id = %args.agent_id,
            session_id = %self.session_id,
            user_id = %args.user_id,
            "initializing session"
        );

        let project_name = pick_project_name(&args.query);
        debug_assert!(is_valid_project_name(&project_name));

        let mut state = SessionState::initial(self.project_type);
        state.base.project_name = project_name.clone();
        state.base.query = args.query.clone();
        state.base.session_id = self.session_id.clone();
        state.base.hostname = args.hostname;
        state.base.template_name = args.template_name.clone();
        state.base.agent_mode = args.agent_mode;
        state.base.inference_context = InferenceContext {
            user_id: args.user_id,
            agent_id: args.agent_id,
        };
        self.state.replace(state);

        // The VCS store is constructed initialized; a rehydrated one keeps
        // its objects.
        self.vcs.lock().expect("vcs lock poisoned").init();

        let scaffold = match self.project_type {
            ProjectType::App => self.scaffold.app(&args.template_name, &project_name),
            ProjectType::Workflow => self.scaffold.workflow(&WorkflowScaffoldRequest {
                workflow_name: project_name.clone(),
                workflow_code: None,
                metadata: None,
            }),
        };
        *self
            .scaffold_entries
            .lock()
            .expect("scaffold lock poisoned") = scaffold.important_files.clone();
        self.files
            .save_files(scaffold.all_files, "initial scaffold")?;

        if let Err(e) = self
            .deploy
            .deploy_to_sandbox(
                SandboxDeployArgs {
                    clear_logs: true,
                    ..Default::default()
                },
                &self.broadcast_hooks(),
            )
            .await
        {
            warn!(error = %e, "initial sandbox deploy failed; session stays usable");
        }

        self.plugins.on_initialize(&self.plugin_ctx()).await;
        Ok(self.state.snapshot())
    }

    /// Rebuild in-memory caches from a persisted record (cold start).
    pub async fn rehydrate(self: &Arc<Self>, state: SessionState) -> Result<(), SessionError> {
        if state.project_type() != self.project_type {
            return Err(SessionError::Internal(
                "rehydration state has mismatched project type".into(),
            ));
        }
        self.state.replace(state);
        // Transient caches do not survive a cold start.
        self.mutate(|s| {
            for input in &mut s.base.pending_user_inputs {
                input.images.clear();
            }
        })
        .await;
        Ok(())
    }

    pub(crate) fn scaffold_important_files(&self) -> Vec<String> {
        self.scaffold_entries
            .lock()
            .expect("scaffold lock poisoned")
            .clone()
    }

    // --- generation tracking -------------------------------------------------

    pub fn is_generating(&self) -> bool {
        *self.generation_active.borrow()
    }

    /// `generate_all`: set intent and start unless already running.
    pub async fn start_generation(self: &Arc<Self>) -> Result<(), SessionError> {
        self.mutate(|s| s.base.should_be_generating = true).await;
        if self.is_generating() {
            return Ok(());
        }
        let Some(controller) = self.controller() else {
            self.deferred_start.store(true, Ordering::SeqCst);
            return Ok(());
        };
        self.spawn_generation(controller, false);
        Ok(())
    }

    /// `resume_generation` (app-only at the control surface).
    pub async fn resume_generation(self: &Arc<Self>) -> Result<(), SessionError> {
        self.mutate(|s| s.base.should_be_generating = true).await;
        if self.is_generating() {
            return Ok(());
        }
        let Some(controller) = self.controller() else {
            self.deferred_start.store(true, Ordering::SeqCst);
            return Ok(());
        };
        self.spawn_generation(controller, true);
        Ok(())
    }

    fn spawn_generation(self: &Arc<Self>, controller: Arc<dyn ProjectController>, resume: bool) {
        if self.generation_active.send_replace(true) {
            return;
        }
        let token = self.cancellation.current();
        let me = self.arc();
        tokio::spawn(async move {
            let ctx = me.plugin_ctx();
            me.plugins.on_generation_start(&ctx).await;
            me.broadcast(if resume {
                SessionEvent::GenerationResumed
            } else {
                SessionEvent::GenerationStarted
            });

            let result = if resume {
                controller.resume(&me, &token).await
            } else {
                controller.generate(&me, &token).await
            };

            match result {
                Ok(()) => {
                    me.mutate(|s| s.base.should_be_generating = false).await;
                    me.broadcast(SessionEvent::GenerationCompleted);
                    me.plugins.on_generation_complete(&ctx).await;
                }
                Err(SessionError::Cancelled) => {
                    // The stop path already acknowledged with
                    // generation_stopped; the in-flight phase stays
                    // incomplete for resume.
                    info!("generation cancelled");
                }
                Err(e) => {
                    warn!(error = %e, "generation failed");
                    me.plugins.on_error(&ctx, &e.to_string(), "generation").await;
                    me.broadcast(SessionEvent::Error {
                        error: e.to_string(),
                    });
                }
            }
            me.generation_active.send_replace(false);
        });
    }

    /// `stop_generation`: abort the token and acknowledge.
    pub async fn stop_generation(&self) {
        self.cancellation.cancel();
        if self.project_type == ProjectType::App {
            self.mutate(|s| s.base.should_be_generating = false).await;
        }
        self.broadcast(SessionEvent::GenerationStopped);
    }

    pub async fn generation_settled(&self) {
        let mut rx = self.generation_active.subscribe();
        loop {
            if !*rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    // --- deploy hooks --------------------------------------------------------

    /// Hooks that narrate a sandbox deploy on the event bus.
    pub fn broadcast_hooks(&self) -> SandboxBroadcastHooks {
        SandboxBroadcastHooks { agent: self.arc() }
    }

    /// Hooks that narrate an external deploy on the event bus.
    pub fn cloudflare_hooks(&self) -> CloudflareBroadcastHooks {
        CloudflareBroadcastHooks { agent: self.arc() }
    }

    // --- export (§ credentials & export) -------------------------------------

    pub fn export_git_objects(&self) -> GitObjectsExport {
        let vcs = self.vcs.lock().expect("vcs lock poisoned");
        let state = self.state.snapshot();
        GitObjectsExport {
            objects: vcs.export_objects(),
            query: state.base.query,
            has_commits: vcs.head().is_some(),
            template_details: Some(state.base.template_name),
        }
    }

    pub(crate) fn export_client(&self) -> Option<Arc<dyn ExportClient>> {
        self.export_client.clone()
    }

    pub fn model_configs_payload(&self) -> Value {
        model_configs()
    }
}

// --- deploy hook adapters ----------------------------------------------------

pub struct SandboxBroadcastHooks {
    agent: Arc<SessionAgent>,
}

#[async_trait]
impl DeployHooks for SandboxBroadcastHooks {
    async fn on_started(&self) {
        self.agent
            .plugins
            .before_deployment(&self.agent.plugin_ctx())
            .await;
        self.agent.broadcast(SessionEvent::DeploymentStarted);
    }

    async fn on_completed(&self, preview_url: &str) {
        self.agent.broadcast(SessionEvent::DeploymentCompleted {
            preview_url: preview_url.to_string(),
        });
        self.agent
            .plugins
            .after_deployment(&self.agent.plugin_ctx(), preview_url)
            .await;
    }

    async fn on_error(&self, error: &str) {
        self.agent.broadcast(SessionEvent::DeploymentFailed {
            error: error.to_string(),
        });
    }
}

pub struct CloudflareBroadcastHooks {
    agent: Arc<SessionAgent>,
}

#[async_trait]
impl DeployHooks for CloudflareBroadcastHooks {
    async fn on_started(&self) {
        self.agent
            .broadcast(SessionEvent::CloudflareDeploymentStarted);
    }

    async fn on_completed(&self, deployment_url: &str) {
        self.agent
            .broadcast(SessionEvent::CloudflareDeploymentCompleted {
                deployment_url: deployment_url.to_string(),
            });
    }

    async fn on_error(&self, error: &str) {
        self.agent.broadcast(SessionEvent::CloudflareDeploymentError {
            error: error.to_string(),
        });
    }

    async fn on_preview_expired(&self) {
        self.agent.broadcast(SessionEvent::PreviewForceRefresh);
    }
}

/// Deterministic-prefix, random-suffix project name.
fn pick_project_name(query: &str) -> String {
    let prefix = sanitize_project_name(query);
    let prefix = if prefix.len() < 3 {
        format!("app-{prefix}")
    } else {
        prefix
    };
    let suffix: String = Uuid::now_v7().simple().to_string().chars().take(6).collect();
    let name = format!("{}-{suffix}", prefix.trim_end_matches('-'));
    if is_valid_project_name(&name) {
        name
    } else {
        format!("project-{suffix}")
    }
}

// --- the trimmed capability surface (tools see this, not the session) --------

#[async_trait]
impl AgentHandle for SessionAgent {
    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    async fn state(&self) -> SessionState {
        self.state.snapshot()
    }

    async fn broadcast(&self, event: SessionEvent) {
        self.events.broadcast(&event);
    }

    async fn read_files(&self, paths: Option<Vec<String>>) -> Vec<FileRecord> {
        self.state.read(|s| {
            s.base
                .generated_files
                .values()
                .filter(|f| match &paths {
                    Some(paths) => paths.contains(&f.file_path),
                    None => true,
                })
                .cloned()
                .collect()
        })
    }

    async fn save_files(
        &self,
        files: Vec<FileRecord>,
        commit_message: String,
    ) -> Result<(), SessionError> {
        self.files.save_files(files, &commit_message)
    }

    async fn delete_files(&self, paths: Vec<String>) -> Result<(), SessionError> {
        self.files.delete_files(&paths)
    }

    async fn exec_commands(&self, commands: Vec<String>) -> ExecResponse {
        let Some(instance_id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) else {
            return ExecResponse {
                success: false,
                error: Some("no sandbox instance".into()),
                outcomes: Vec::new(),
            };
        };
        let response = self
            .sandbox
            .execute_commands(&instance_id, &commands, None)
            .await;
        if response.success {
            self.mutate(|s| {
                for command in &commands {
                    s.push_command(command.clone());
                }
            })
            .await;
        }
        response
    }

    async fn get_logs(&self, reset: bool) -> LogsResponse {
        let Some(instance_id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) else {
            return LogsResponse {
                success: false,
                error: Some("no sandbox instance".into()),
                logs: String::new(),
            };
        };
        self.sandbox.get_logs(&instance_id, reset, None).await
    }

    async fn deploy_preview(&self) -> Result<String, SessionError> {
        self.deploy
            .deploy_to_sandbox(SandboxDeployArgs::default(), &self.broadcast_hooks())
            .await
    }

    async fn run_static_analysis(&self) -> AnalysisResponse {
        self.deploy.run_static_analysis(None).await
    }

    async fn fetch_runtime_errors(&self, clear: bool) -> RuntimeErrorsResponse {
        self.deploy.fetch_runtime_errors(clear).await
    }

    async fn rename_project(&self, name: String) -> Result<(), SessionError> {
        if !is_valid_project_name(&name) {
            return Err(SessionError::Validation(format!(
                "invalid project name: {name} (expected ^[a-z0-9-_]{{3,50}}$)"
            )));
        }
        if let Some(instance_id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) {
            let response = self.sandbox.update_project_name(&instance_id, &name).await;
            if !response.success {
                return Err(SessionError::Sandbox(
                    response
                        .error
                        .unwrap_or_else(|| "project rename rejected".into()),
                ));
            }
        }
        self.mutate(|s| s.base.project_name = name).await;
        Ok(())
    }

    async fn git_log(&self, limit: usize) -> Vec<CommitSummary> {
        self.vcs.lock().expect("vcs lock poisoned").log(limit)
    }

    async fn queue_user_request(&self, input: PendingUserInput) {
        self.mutate(|s| s.base.pending_user_inputs.push(input)).await;
    }

    async fn note_project_update(&self, note: String) {
        self.mutate(|s| s.base.project_updates.push(note)).await;
    }

    async fn wait_for_generation(&self) {
        self.generation_settled().await;
    }

    async fn wait_for_debug(&self) {
        self.debug.wait_idle().await;
    }

    async fn deep_debug(&self, request: DeepDebugRequest) -> DeepDebugOutcome {
        let me = self.arc();
        self.debug.run(&me, request).await
    }

    async fn alter_blueprint(&self, patch: Blueprint) -> Result<(), SessionError> {
        if self.project_type != ProjectType::App {
            return Err(SessionError::Validation(
                "blueprint is only available for app sessions".into(),
            ));
        }
        self.mutate(|s| {
            if let Some(app) = s.as_app_mut() {
                app.blueprint = Some(patch);
            }
        })
        .await;
        Ok(())
    }

    async fn regenerate_file(&self, path: String) -> Result<FileRecord, SessionError> {
        if self.project_type != ProjectType::App {
            return Err(SessionError::Validation(
                "regenerate_file is only available for app sessions".into(),
            ));
        }
        let Some(current) = self.files.get_file(&path) else {
            return Err(SessionError::Validation(format!("unknown file: {path}")));
        };
        let state = self.state.snapshot();
        let response = self
            .inference
            .execute(InferenceRequest {
                messages: vec![
                    InferenceMessage::system(
                        "You rewrite one source file of a small web application. Respond with \
                         the complete file contents only.",
                    ),
                    InferenceMessage::user(format!(
                        "Project request: {}\nRewrite `{path}` ({}) from scratch, keeping its \
                         role.\nCurrent contents:\n{}",
                        state.base.query, current.file_purpose, current.file_contents
                    )),
                ],
                tools: Vec::new(),
            })
            .await
            .map_err(|e| SessionError::Inference(e.to_string()))?;
        let contents =
            crate::controllers::strip_code_fence(response.text.as_deref().unwrap_or_default());
        if contents.is_empty() {
            return Err(SessionError::Inference(
                "regeneration produced no contents".into(),
            ));
        }
        let record = FileRecord::new(path.clone(), contents).with_purpose(current.file_purpose);
        self.files
            .save_files(vec![record.clone()], &format!("regenerate {path}"))?;
        self.events.broadcast(&SessionEvent::FileGenerated {
            file_path: record.file_path.clone(),
            file_purpose: record.file_purpose.clone(),
        });
        Ok(record)
    }

    async fn merge_workflow_metadata(
        &self,
        update: WorkflowMetadata,
    ) -> Result<WorkflowMetadata, SessionError> {
        if self.project_type != ProjectType::Workflow {
            return Err(SessionError::Validation(
                "workflow metadata is only available for workflow sessions".into(),
            ));
        }
        Ok(self
            .mutate(|s| {
                let wf = s.as_workflow_mut().expect("workflow state");
                let mut merged = wf.workflow_metadata.clone().unwrap_or_default();
                merged.merge(update);
                wf.workflow_metadata = Some(merged.clone());
                merged
            })
            .await)
    }

    async fn web_search(&self, query: String) -> Result<String, SessionError> {
        match &self.web_search {
            Some(provider) => provider
                .search(&query)
                .await
                .map_err(SessionError::Internal),
            None => Err(SessionError::Internal(
                "search provider not configured".into(),
            )),
        }
    }
}
