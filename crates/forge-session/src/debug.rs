//! Deep-debug assistant (C12).
//!
//! A tool-using diagnostic loop over the current runtime errors and a
//! focus-filtered file index. At most one session per agent is in flight;
//! a second caller awaits the first and receives its outcome. Cancellation
//! of the main generation does not propagate here.

use crate::session::SessionAgent;
use crate::tools::{GetLogsTool, GitTool, ToolRegistry, WebSearchTool};
use forge_contract::{
    AgentHandle, DeepDebugOutcome, DeepDebugRequest, InferenceMessage, InferenceRequest,
    SessionEvent, ToolContext,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Dialogue rounds before the loop gives up.
const MAX_DEBUG_ROUNDS: usize = 8;

/// Per-file cap in the index handed to the model.
const MAX_INDEXED_FILE_CHARS: usize = 4_000;

#[derive(Default)]
pub struct DeepDebugAssistant {
    slot: Mutex<Option<watch::Receiver<Option<DeepDebugOutcome>>>>,
}

impl DeepDebugAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a diagnostic session, or join the one already in flight.
    pub async fn run(
        &self,
        session: &Arc<SessionAgent>,
        request: DeepDebugRequest,
    ) -> DeepDebugOutcome {
        let tx = {
            let mut guard = self.slot.lock().await;
            if let Some(rx) = guard.as_ref() {
                let mut rx = rx.clone();
                drop(guard);
                debug!("deep-debug already in flight; awaiting its outcome");
                loop {
                    let settled = rx.borrow().clone();
                    if let Some(outcome) = settled {
                        return outcome;
                    }
                    if rx.changed().await.is_err() {
                        return DeepDebugOutcome::err("previous deep-debug session aborted");
                    }
                }
            }
            let (tx, rx) = watch::channel(None);
            *guard = Some(rx);
            tx
        };

        let outcome = self.run_inner(session, request).await;
        let _ = tx.send(Some(outcome.clone()));
        *self.slot.lock().await = None;
        outcome
    }

    /// Resolve once no deep-debug session is in flight.
    pub async fn wait_idle(&self) {
        let rx = self.slot.lock().await.clone();
        let Some(mut rx) = rx else { return };
        loop {
            if rx.borrow().is_some() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn run_inner(
        &self,
        session: &Arc<SessionAgent>,
        request: DeepDebugRequest,
    ) -> DeepDebugOutcome {
        let runtime = session.deploy.fetch_runtime_errors(true).await;
        let state = session.state.snapshot();

        let mut index = String::new();
        for file in state.base.generated_files.values() {
            let in_focus = request.focus_paths.is_empty()
                || request
                    .focus_paths
                    .iter()
                    .any(|prefix| file.file_path.starts_with(prefix.as_str()));
            if !in_focus {
                continue;
            }
            let mut contents = file.file_contents.clone();
            if contents.len() > MAX_INDEXED_FILE_CHARS {
                contents.truncate(MAX_INDEXED_FILE_CHARS);
                contents.push_str("\n… (truncated)");
            }
            index.push_str(&format!("### {}\n{}\n\n", file.file_path, contents));
        }

        let mut prompt = format!("Issue under investigation: {}\n", request.issue);
        if let Some(previous) = &request.previous_transcript {
            prompt.push_str(&format!("\nPrevious debugging transcript:\n{previous}\n"));
        }
        if runtime.errors.is_empty() {
            prompt.push_str("\nNo runtime errors are currently captured.\n");
        } else {
            prompt.push_str("\nCaptured runtime errors:\n");
            for error in &runtime.errors {
                prompt.push_str(&format!("- {}\n", error.message));
                if let Some(stack) = &error.stack {
                    prompt.push_str(&format!("  {stack}\n"));
                }
            }
        }
        prompt.push_str(&format!("\nProject files:\n{index}"));

        // Read-only tool subset; the debugger must not re-enter itself.
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetLogsTool));
        registry.register(Arc::new(GitTool));
        registry.register(Arc::new(WebSearchTool));
        let descriptors = registry.descriptors();
        let handle: Arc<dyn AgentHandle> = session.clone();
        let ctx = ToolContext::new(handle, session.cancellation.current());

        let mut messages = vec![
            InferenceMessage::system(DEBUG_SYSTEM_PROMPT),
            InferenceMessage::user(prompt),
        ];
        let mut transcript = String::new();

        for round in 0..MAX_DEBUG_ROUNDS {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let forwarder = {
                let session = session.clone();
                tokio::spawn(async move {
                    while let Some(chunk) = rx.recv().await {
                        session.broadcast(SessionEvent::TextDelta { delta: chunk });
                    }
                })
            };
            let response = session
                .inference
                .execute_stream(
                    InferenceRequest {
                        messages: messages.clone(),
                        tools: descriptors.clone(),
                    },
                    tx,
                )
                .await;
            let _ = forwarder.await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(round, error = %e, "deep-debug inference failed");
                    // A partial transcript is still a usable diagnosis.
                    if transcript.is_empty() {
                        return DeepDebugOutcome::err(e.to_string());
                    }
                    break;
                }
            };

            if let Some(text) = &response.text {
                if !text.is_empty() {
                    if !transcript.is_empty() {
                        transcript.push_str("\n\n");
                    }
                    transcript.push_str(text);
                }
            }
            if response.tool_calls.is_empty() {
                break;
            }

            messages.push(InferenceMessage::assistant_with_tool_calls(
                response.text.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let result = registry
                    .dispatch(&call.name, call.arguments.clone(), &ctx)
                    .await;
                transcript.push_str(&format!("\n[{}] {}", call.name, result.to_llm_json()));
                messages.push(InferenceMessage::tool(
                    call.id.clone(),
                    result.to_llm_json().to_string(),
                ));
            }
        }

        if transcript.is_empty() {
            return DeepDebugOutcome::err("deep debug produced no transcript");
        }
        session
            .mutate(|s| s.base.last_deep_debug_transcript = Some(transcript.clone()))
            .await;
        DeepDebugOutcome::ok(transcript)
    }
}

const DEBUG_SYSTEM_PROMPT: &str = "You are a debugging assistant for a generated web project. \
Read the captured runtime errors and the file index, investigate with the available read-only \
tools, and finish with a diagnosis and a concrete patch suggestion per affected file.";
