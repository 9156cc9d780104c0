//! The in-process session registry.

use forge_contract::{
    AgentMode, DeployClient, ExportClient, InferenceClient, ProjectType, SandboxClient,
    SecretsProvider, SessionError,
};
use forge_session::{
    ConversationStore, InitializeArgs, ScaffoldProvider, SessionAgent, SessionConfig,
    TemplateScaffold,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Shared collaborators injected into every new session.
pub struct ServiceConfig {
    pub sandbox: Arc<dyn SandboxClient>,
    pub inference: Arc<dyn InferenceClient>,
    pub conversation_store: Arc<dyn ConversationStore>,
    pub scaffold: Arc<dyn ScaffoldProvider>,
    pub secrets: Option<Arc<dyn SecretsProvider>>,
    pub deploy_client: Option<Arc<dyn DeployClient>>,
    pub export_client: Option<Arc<dyn ExportClient>>,
    pub hostname: String,
}

impl ServiceConfig {
    pub fn new(
        sandbox: Arc<dyn SandboxClient>,
        inference: Arc<dyn InferenceClient>,
        conversation_store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            sandbox,
            inference,
            conversation_store,
            scaffold: Arc::new(TemplateScaffold),
            secrets: None,
            deploy_client: None,
            export_client: None,
            hostname: "localhost".into(),
        }
    }
}

/// A session-creation request from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub query: String,
    pub project_type: ProjectType,
    #[serde(default)]
    pub agent_mode: AgentMode,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
}

/// One line of the session-creation bootstrap stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapEvent {
    #[serde(rename = "agentId", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "websocketUrl", skip_serializing_if = "Option::is_none")]
    pub websocket_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
}

impl BootstrapEvent {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Default::default()
        }
    }
}

pub struct SessionService {
    config: ServiceConfig,
    sessions: RwLock<HashMap<String, Arc<SessionAgent>>>,
}

impl SessionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create and initialize a new session agent.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<Arc<SessionAgent>, SessionError> {
        let mut session_config = SessionConfig::new(
            request.project_type,
            self.config.sandbox.clone(),
            self.config.inference.clone(),
            self.config.conversation_store.clone(),
        )
        .with_scaffold(self.config.scaffold.clone());
        if let Some(secrets) = &self.config.secrets {
            session_config = session_config.with_secrets(secrets.clone());
        }
        if let Some(client) = &self.config.deploy_client {
            session_config = session_config.with_deploy_client(client.clone());
        }
        if let Some(client) = &self.config.export_client {
            session_config = session_config.with_export_client(client.clone());
        }

        let session = SessionAgent::new(session_config);
        let agent_id = session.session_id().to_string();
        session
            .initialize(InitializeArgs {
                query: request.query,
                hostname: self.config.hostname.clone(),
                user_id: request.user_id.unwrap_or_default(),
                agent_id: agent_id.clone(),
                template_name: request
                    .template_name
                    .unwrap_or_else(|| default_template(request.project_type).to_string()),
                agent_mode: request.agent_mode,
            })
            .await?;

        self.sessions
            .write()
            .await
            .insert(agent_id.clone(), session.clone());
        info!(agent_id, "session created");
        Ok(session)
    }

    pub async fn get(&self, agent_id: &str) -> Option<Arc<SessionAgent>> {
        self.sessions.read().await.get(agent_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn websocket_url(&self, agent_id: &str) -> String {
        format!("/v1/sessions/{agent_id}/ws")
    }
}

fn default_template(project_type: ProjectType) -> &'static str {
    match project_type {
        ProjectType::App => "vite-react",
        ProjectType::Workflow => "cloudflare-workflow",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::DevSandbox;
    use forge_session::testing::ScriptedInference;
    use forge_session::MemoryConversationStore;

    fn service() -> SessionService {
        SessionService::new(ServiceConfig::new(
            Arc::new(DevSandbox::new("preview.localhost")),
            Arc::new(ScriptedInference::new()),
            Arc::new(MemoryConversationStore::new()),
        ))
    }

    #[tokio::test]
    async fn create_session_registers_and_initializes() {
        let service = service();
        let session = service
            .create_session(CreateSessionRequest {
                query: "make a counter".into(),
                project_type: ProjectType::App,
                agent_mode: AgentMode::Deterministic,
                user_id: Some("user-1".into()),
                template_name: None,
            })
            .await
            .unwrap();

        assert_eq!(service.session_count().await, 1);
        let fetched = service.get(session.session_id()).await.unwrap();
        let state = fetched.state_snapshot();
        assert_eq!(state.base.query, "make a counter");
        assert_eq!(state.base.template_name, "vite-react");
        assert!(state.base.sandbox_instance_id.is_some());
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_id() {
        let service = service();
        let a = service
            .create_session(CreateSessionRequest {
                query: "first app".into(),
                project_type: ProjectType::App,
                agent_mode: AgentMode::Deterministic,
                user_id: None,
                template_name: None,
            })
            .await
            .unwrap();
        let b = service
            .create_session(CreateSessionRequest {
                query: "second workflow".into(),
                project_type: ProjectType::Workflow,
                agent_mode: AgentMode::Deterministic,
                user_id: None,
                template_name: None,
            })
            .await
            .unwrap();

        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(service.session_count().await, 2);
        assert_eq!(a.state_snapshot().base.query, "first app");
        assert_eq!(b.state_snapshot().base.query, "second workflow");
    }

    #[tokio::test]
    async fn unknown_session_lookup_is_none() {
        let service = service();
        assert!(service.get("missing").await.is_none());
    }
}
