//! Deployment sequencing (C7).
//!
//! Sandbox deploys are serialized per session: the deploy mutex queues
//! callers in arrival order, so at most one deploy is ever in flight.
//! The manager owns no persistent state; it reads and writes through the
//! state store handle it was built with.

use crate::files::FileManager;
use crate::state::StateStore;
use async_trait::async_trait;
use forge_contract::limits::{PREVIEW_POLL_MILLIS, PREVIEW_WAIT_SECS};
use forge_contract::{
    AnalysisResponse, CloudflareCredentials, DeployClient, DeploymentStatus, FileRecord,
    RuntimeErrorsResponse, SandboxClient, SandboxFile, SecretsProvider, SessionError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle callbacks fired across one deploy.
#[async_trait]
pub trait DeployHooks: Send + Sync {
    async fn on_started(&self) {}
    async fn on_completed(&self, _preview_url: &str) {}
    async fn on_error(&self, _error: &str) {}
    /// After the persisted bootstrap commands ran on a fresh instance.
    async fn on_after_setup_commands(&self) {}
    /// The external deploy reported an expired sandbox preview.
    async fn on_preview_expired(&self) {}
}

/// Hook set that observes nothing.
pub struct NoHooks;

#[async_trait]
impl DeployHooks for NoHooks {}

/// Arguments for one sandbox deploy.
#[derive(Debug, Clone, Default)]
pub struct SandboxDeployArgs {
    /// Files to push; empty pushes the whole generated map.
    pub files: Vec<FileRecord>,
    /// Push the entire map regardless of `files`.
    pub redeploy: bool,
    /// When set, commit `files` through the file manager first.
    pub commit_message: Option<String>,
    pub clear_logs: bool,
}

pub struct DeploymentManager {
    state: Arc<StateStore>,
    files: Arc<FileManager>,
    sandbox: Arc<dyn SandboxClient>,
    secrets: Option<Arc<dyn SecretsProvider>>,
    deploy_client: Option<Arc<dyn DeployClient>>,
    deploy_lock: tokio::sync::Mutex<()>,
    preview_url: Mutex<Option<String>>,
    bootstrapped: Mutex<HashSet<String>>,
}

impl DeploymentManager {
    pub fn new(
        state: Arc<StateStore>,
        files: Arc<FileManager>,
        sandbox: Arc<dyn SandboxClient>,
        secrets: Option<Arc<dyn SecretsProvider>>,
        deploy_client: Option<Arc<dyn DeployClient>>,
    ) -> Self {
        Self {
            state,
            files,
            sandbox,
            secrets,
            deploy_client,
            deploy_lock: tokio::sync::Mutex::new(()),
            preview_url: Mutex::new(None),
            bootstrapped: Mutex::new(HashSet::new()),
        }
    }

    /// The last preview URL a successful deploy produced.
    pub fn cached_preview_url(&self) -> Option<String> {
        self.preview_url.lock().expect("preview lock poisoned").clone()
    }

    /// Deploy to the sandbox. Serialized per session.
    pub async fn deploy_to_sandbox(
        &self,
        args: SandboxDeployArgs,
        hooks: &dyn DeployHooks,
    ) -> Result<String, SessionError> {
        let _guard = self.deploy_lock.lock().await;
        hooks.on_started().await;

        let result = self.deploy_inner(args, hooks).await;
        match &result {
            Ok(url) => hooks.on_completed(url).await,
            Err(e) => hooks.on_error(&e.to_string()).await,
        }
        result
    }

    async fn deploy_inner(
        &self,
        args: SandboxDeployArgs,
        hooks: &dyn DeployHooks,
    ) -> Result<String, SessionError> {
        if let Some(message) = &args.commit_message {
            if !args.files.is_empty() {
                self.files.save_files(args.files.clone(), message)?;
            }
        }

        let instance_id = self.ensure_instance().await?;

        let push: Vec<SandboxFile> = if args.redeploy || args.files.is_empty() {
            self.state.read(|s| {
                s.base
                    .generated_files
                    .values()
                    .map(|f| SandboxFile {
                        path: f.file_path.clone(),
                        contents: f.file_contents.clone(),
                    })
                    .collect()
            })
        } else {
            args.files
                .iter()
                .map(|f| SandboxFile {
                    path: f.file_path.clone(),
                    contents: f.file_contents.clone(),
                })
                .collect()
        };
        let response = self.sandbox.write_files(&instance_id, &push).await;
        if !response.success {
            return Err(SessionError::Sandbox(
                response.error.unwrap_or_else(|| "file push failed".into()),
            ));
        }

        if args.clear_logs {
            let _ = self.sandbox.get_logs(&instance_id, true, None).await;
        }

        self.bootstrap_instance(&instance_id).await;
        hooks.on_after_setup_commands().await;

        let response = self.sandbox.deploy(&instance_id).await;
        if !response.success {
            return Err(SessionError::Sandbox(
                response.error.unwrap_or_else(|| "sandbox deploy failed".into()),
            ));
        }

        let url = self.wait_for_preview(&instance_id).await?;
        *self.preview_url.lock().expect("preview lock poisoned") = Some(url.clone());
        info!(instance_id, preview_url = %url, "sandbox deploy complete");
        Ok(url)
    }

    async fn ensure_instance(&self) -> Result<String, SessionError> {
        if let Some(id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) {
            return Ok(id);
        }
        let project_name = self.state.read(|s| s.base.project_name.clone());
        let response = self.sandbox.create_instance(&project_name).await;
        if !response.success {
            return Err(SessionError::Sandbox(
                response
                    .error
                    .unwrap_or_else(|| "instance creation failed".into()),
            ));
        }
        let id = response
            .instance_id
            .ok_or_else(|| SessionError::Sandbox("instance response missing id".into()))?;
        self.state
            .update(|s| s.base.sandbox_instance_id = Some(id.clone()));
        Ok(id)
    }

    /// Replay persisted bootstrap commands once per instance, then sync
    /// `package.json` if a dependency-altering command ran.
    async fn bootstrap_instance(&self, instance_id: &str) {
        let fresh = self
            .bootstrapped
            .lock()
            .expect("bootstrap lock poisoned")
            .insert(instance_id.to_string());
        if !fresh {
            return;
        }
        let commands = self.state.read(|s| s.base.commands_history.clone());
        if commands.is_empty() {
            return;
        }
        let response = self
            .sandbox
            .execute_commands(instance_id, &commands, None)
            .await;
        if !response.success {
            warn!(instance_id, "bootstrap command replay failed");
        }
        if commands.iter().any(|c| is_dependency_altering(c)) {
            self.sync_package_json(instance_id).await;
        }
    }

    /// Pull `package.json` back from the sandbox and update the file map
    /// when the installed dependencies drifted.
    pub async fn sync_package_json(&self, instance_id: &str) {
        let paths = vec!["package.json".to_string()];
        let response = self.sandbox.get_files(instance_id, Some(&paths)).await;
        if !response.success {
            return;
        }
        let Some(manifest) = response.files.into_iter().find(|f| f.path == "package.json") else {
            return;
        };
        let known = self.state.read(|s| s.base.last_package_json.clone());
        if known.as_deref() == Some(manifest.contents.as_str()) {
            return;
        }
        if let Err(e) = self.files.save_files(
            vec![FileRecord::new("package.json", manifest.contents.clone())
                .with_purpose("package manifest")],
            "sync sandbox dependencies",
        ) {
            warn!(error = %e, "package.json sync commit failed");
            return;
        }
        self.state
            .update(|s| s.base.last_package_json = Some(manifest.contents));
    }

    /// Poll the sandbox until the preview answers, bounded.
    pub async fn wait_for_preview(&self, instance_id: &str) -> Result<String, SessionError> {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(PREVIEW_WAIT_SECS);
        loop {
            let status = self.sandbox.preview_status(instance_id).await;
            if status.success && status.ready {
                if let Some(url) = status.preview_url {
                    return Ok(url);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Deploy(format!(
                    "preview not ready within {PREVIEW_WAIT_SECS}s"
                )));
            }
            tokio::time::sleep(Duration::from_millis(PREVIEW_POLL_MILLIS)).await;
        }
    }

    pub async fn run_static_analysis(&self, files: Option<Vec<String>>) -> AnalysisResponse {
        let Some(instance_id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) else {
            return AnalysisResponse {
                success: false,
                error: Some("no sandbox instance".into()),
                ..Default::default()
            };
        };
        self.sandbox
            .run_static_analysis(&instance_id, files.as_deref())
            .await
    }

    /// Fetch runtime errors. A failed fetch triggers an implicit redeploy
    /// and reports no errors to the caller.
    pub async fn fetch_runtime_errors(&self, clear: bool) -> RuntimeErrorsResponse {
        let Some(instance_id) = self.state.read(|s| s.base.sandbox_instance_id.clone()) else {
            return RuntimeErrorsResponse {
                success: true,
                ..Default::default()
            };
        };
        let response = self.sandbox.fetch_runtime_errors(&instance_id, clear).await;
        if response.success {
            return response;
        }
        warn!(instance_id, "runtime error fetch failed; redeploying sandbox");
        let _ = self
            .deploy_to_sandbox(
                SandboxDeployArgs {
                    redeploy: true,
                    ..Default::default()
                },
                &NoHooks,
            )
            .await;
        RuntimeErrorsResponse {
            success: true,
            ..Default::default()
        }
    }

    /// Deploy to the external cloud target.
    pub async fn deploy_to_cloudflare(
        &self,
        user_credentials: Option<CloudflareCredentials>,
        hooks: &dyn DeployHooks,
    ) -> Result<String, SessionError> {
        hooks.on_started().await;
        self.set_deployment_status(DeploymentStatus::Deploying, None, None);

        let credentials = match user_credentials {
            Some(creds) => Some(creds),
            None => {
                let user_id = self.state.read(|s| s.base.inference_context.user_id.clone());
                match &self.secrets {
                    Some(secrets) => secrets.cloudflare_credentials(&user_id).await,
                    None => None,
                }
            }
        };
        let Some(credentials) = credentials else {
            let message = "missing Cloudflare credentials: no account id / api token on record";
            self.set_deployment_status(DeploymentStatus::Failed, None, Some(message));
            hooks.on_error(message).await;
            return Err(SessionError::Deploy(message.into()));
        };

        let Some(client) = &self.deploy_client else {
            let message = "deployment client not configured";
            self.set_deployment_status(DeploymentStatus::Failed, None, Some(message));
            hooks.on_error(message).await;
            return Err(SessionError::Deploy(message.into()));
        };

        let instance_id = match self.ensure_instance().await {
            Ok(id) => id,
            Err(e) => {
                let message = e.to_string();
                self.set_deployment_status(DeploymentStatus::Failed, None, Some(&message));
                hooks.on_error(&message).await;
                return Err(e);
            }
        };
        let project_name = self.state.read(|s| s.base.project_name.clone());
        let response = client.deploy(&project_name, &instance_id, &credentials).await;

        if response.success {
            let url = response
                .deployment_url
                .unwrap_or_else(|| format!("https://{project_name}.workers.dev"));
            self.set_deployment_status(DeploymentStatus::Deployed, Some(&url), None);
            hooks.on_completed(&url).await;
            return Ok(url);
        }

        let message = response
            .error
            .clone()
            .unwrap_or_else(|| "cloud deployment failed".into());
        if response.is_preview_expired() {
            hooks.on_preview_expired().await;
            let _ = self
                .deploy_to_sandbox(
                    SandboxDeployArgs {
                        redeploy: true,
                        ..Default::default()
                    },
                    &NoHooks,
                )
                .await;
        }
        self.set_deployment_status(DeploymentStatus::Failed, None, Some(&message));
        hooks.on_error(&message).await;
        Err(SessionError::Deploy(message))
    }

    fn set_deployment_status(
        &self,
        status: DeploymentStatus,
        url: Option<&str>,
        error: Option<&str>,
    ) {
        self.state.update(|s| {
            if let Some(wf) = s.as_workflow_mut() {
                wf.deployment_status = status;
                if let Some(url) = url {
                    wf.deployment_url = Some(url.to_string());
                }
                wf.deployment_error = error.map(str::to_string);
            }
        });
    }
}

/// Commands that change the installed dependency set.
pub fn is_dependency_altering(command: &str) -> bool {
    let padded = format!(" {} ", command.trim());
    ["install", " add ", "remove", "uninstall"]
        .iter()
        .any(|marker| padded.contains(marker))
}
