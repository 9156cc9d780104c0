//! Agentic workflow generation (C11).
//!
//! One LLM dialogue with the workflow tool set. The model drives code and
//! metadata through `generate_files` and `configure_workflow_metadata`;
//! generation ends when it stops issuing tool calls or cancellation is
//! observed. Afterwards the scaffold is regenerated so `wrangler.jsonc`
//! and `README.md` reflect the final metadata.

use crate::controllers::ProjectController;
use crate::deploy::SandboxDeployArgs;
use crate::scaffold::WorkflowScaffoldRequest;
use crate::session::SessionAgent;
use async_trait::async_trait;
use forge_contract::{
    await_or_cancel, AgentHandle, CancelAware, ConversationMessage, InferenceMessage,
    InferenceRequest, OperationToken, PendingUserInput, ProjectType, SessionError, SessionEvent,
    ToolContext, ToolEvent, ToolEventStatus, WORKFLOW_ENTRY_PATH,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on dialogue rounds; a runaway tool loop stops here.
const MAX_AGENT_ROUNDS: usize = 16;

pub struct WorkflowController;

#[async_trait]
impl ProjectController for WorkflowController {
    fn project_type(&self) -> ProjectType {
        ProjectType::Workflow
    }

    async fn generate(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<(), SessionError> {
        let registry = session.tools.clone();
        let descriptors = registry.descriptors();
        let handle: Arc<dyn AgentHandle> = session.clone();
        let ctx = ToolContext::new(handle, token.clone()).in_generation();

        let state = session.state.snapshot();
        let mut messages = vec![
            InferenceMessage::system(WORKFLOW_SYSTEM_PROMPT),
            InferenceMessage::user(workflow_user_prompt(&state)),
        ];

        for round in 0..MAX_AGENT_ROUNDS {
            if token.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let forwarder = {
                let session = session.clone();
                tokio::spawn(async move {
                    while let Some(chunk) = rx.recv().await {
                        session.broadcast(SessionEvent::TextDelta { delta: chunk });
                    }
                })
            };
            let response = match await_or_cancel(
                token,
                session.inference.execute_stream(
                    InferenceRequest {
                        messages: messages.clone(),
                        tools: descriptors.clone(),
                    },
                    tx,
                ),
            )
            .await
            {
                CancelAware::Cancelled => {
                    forwarder.abort();
                    return Err(SessionError::Cancelled);
                }
                CancelAware::Value(r) => r.map_err(|e| SessionError::Inference(e.to_string()))?,
            };
            let _ = forwarder.await;

            let text = response.text.clone().unwrap_or_default();
            if response.tool_calls.is_empty() {
                if !text.is_empty() {
                    session
                        .conversation
                        .add_message(ConversationMessage::assistant(text))
                        .await;
                }
                debug!(round, "workflow dialogue settled");
                break;
            }

            messages.push(InferenceMessage::assistant_with_tool_calls(
                text.clone(),
                response.tool_calls.clone(),
            ));

            let mut tool_events = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                if token.is_cancelled() {
                    return Err(SessionError::Cancelled);
                }
                let result = registry
                    .dispatch(&call.name, call.arguments.clone(), &ctx)
                    .await;
                tool_events.push(ToolEvent {
                    name: call.name.clone(),
                    status: if result.is_error() {
                        ToolEventStatus::Error
                    } else {
                        ToolEventStatus::Success
                    },
                    args: Some(call.arguments.clone()),
                });
                messages.push(InferenceMessage::tool(
                    call.id.clone(),
                    result.to_llm_json().to_string(),
                ));
            }
            session
                .conversation
                .add_message(
                    ConversationMessage::assistant(text).with_tool_events(tool_events),
                )
                .await;
        }

        self.regenerate_scaffold(session).await?;

        let hooks = session.broadcast_hooks();
        let deploy = session
            .deploy
            .deploy_to_sandbox(SandboxDeployArgs::default(), &hooks);
        match await_or_cancel(token, deploy).await {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(Err(e)) => debug!(error = %e, "workflow preview deploy failed"),
            CancelAware::Value(Ok(_)) => {}
        }
        info!("workflow generation finished");
        Ok(())
    }

    async fn user_suggestion(
        &self,
        session: &Arc<SessionAgent>,
        input: PendingUserInput,
    ) -> Result<(), SessionError> {
        // Workflow sessions fold suggestions straight into the dialogue.
        session
            .conversation
            .add_message(ConversationMessage::user(input.text.clone()))
            .await;
        session
            .mutate(|s| s.base.pending_user_inputs.push(input))
            .await;
        Ok(())
    }
}

impl WorkflowController {
    /// Rebuild `wrangler.jsonc` and `README.md` from the final metadata.
    async fn regenerate_scaffold(&self, session: &Arc<SessionAgent>) -> Result<(), SessionError> {
        let state = session.state.snapshot();
        let Some(workflow) = state.as_workflow() else {
            return Err(SessionError::Internal(
                "workflow controller on non-workflow state".into(),
            ));
        };
        let scaffold = session.scaffold.workflow(&WorkflowScaffoldRequest {
            workflow_name: state.base.project_name.clone(),
            workflow_code: state.workflow_code().map(str::to_string),
            metadata: workflow.workflow_metadata.clone(),
        });
        let derived: Vec<_> = scaffold
            .all_files
            .into_iter()
            .filter(|f| f.file_path == "wrangler.jsonc" || f.file_path == "README.md")
            .collect();
        session
            .files
            .save_files(derived, "regenerate scaffold from metadata")?;
        Ok(())
    }
}

fn workflow_user_prompt(state: &forge_contract::SessionState) -> String {
    let mut prompt = format!(
        "Build a workflow for this request: {}\n\nDeclare code with generate_files \
         (the entry point is {WORKFLOW_ENTRY_PATH}) and metadata with \
         configure_workflow_metadata.",
        state.base.query
    );
    if let Some(code) = state.workflow_code() {
        prompt.push_str(&format!("\n\nCurrent {WORKFLOW_ENTRY_PATH}:\n{code}"));
    }
    let pending: Vec<&str> = state
        .base
        .pending_user_inputs
        .iter()
        .map(|p| p.text.as_str())
        .collect();
    if !pending.is_empty() {
        prompt.push_str(&format!("\n\nQueued user requests:\n- {}", pending.join("\n- ")));
    }
    if !state.base.project_updates.is_empty() {
        prompt.push_str(&format!(
            "\n\nProject updates:\n- {}",
            state.base.project_updates.join("\n- ")
        ));
    }
    prompt
}

const WORKFLOW_SYSTEM_PROMPT: &str = "You build Cloudflare-style workflows. Use the provided \
tools: generate_files to write source files (the entry class must extend WorkflowEntrypoint in \
src/index.ts) and configure_workflow_metadata to declare the workflow name, parameter schema, \
environment variables, secrets, and resource bindings. Stop calling tools when the workflow is \
complete and summarize what you built.";

#[cfg(test)]
mod tests {
    use super::*;
    use forge_contract::{FileRecord, ProjectType, SessionState};

    #[test]
    fn user_prompt_carries_code_and_queued_requests() {
        let mut state = SessionState::initial(ProjectType::Workflow);
        state.base.query = "send a slack message on a schedule".into();
        state.base.generated_files.insert(
            WORKFLOW_ENTRY_PATH.into(),
            FileRecord::new(WORKFLOW_ENTRY_PATH, "export class X {}"),
        );
        state.base.pending_user_inputs.push(PendingUserInput {
            text: "use the #general channel".into(),
            images: Vec::new(),
        });

        let prompt = workflow_user_prompt(&state);
        assert!(prompt.contains("slack message"));
        assert!(prompt.contains("export class X {}"));
        assert!(prompt.contains("#general"));
    }
}
