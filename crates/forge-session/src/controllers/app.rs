//! Phasic app generation (C10).
//!
//! The controller drives `current_dev_state` through plan → implement →
//! review → finalize. Transitions happen only here, and every suspension
//! point observes the operation token.

use crate::controllers::ProjectController;
use crate::deploy::SandboxDeployArgs;
use crate::session::SessionAgent;
use async_trait::async_trait;
use forge_contract::limits::{MAX_PHASES, MAX_REVIEW_CYCLES};
use forge_contract::{
    await_or_cancel, AgentMode, Blueprint, CancelAware, ConversationMessage, DevState,
    FileConcept, FileRecord, InferenceMessage, InferenceRequest, OperationToken, PendingUserInput,
    PhaseConcept, ProjectType, SessionError, SessionEvent,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct AppController;

/// Legal `current_dev_state` edges.
pub fn can_transition(from: DevState, to: DevState) -> bool {
    use DevState::*;
    matches!(
        (from, to),
        (Idle, PhaseGenerating)
            | (PhaseGenerating, PhaseImplementing)
            | (PhaseGenerating, Reviewing)
            | (PhaseImplementing, PhaseImplementing)
            | (PhaseImplementing, PhaseGenerating)
            | (PhaseImplementing, Reviewing)
            | (Reviewing, Reviewing)
            | (Reviewing, Finalizing)
            | (Finalizing, Idle)
    )
}

#[async_trait]
impl ProjectController for AppController {
    fn project_type(&self) -> ProjectType {
        ProjectType::App
    }

    async fn generate(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<(), SessionError> {
        loop {
            if token.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            let state = session.state.snapshot();
            let app = state
                .as_app()
                .ok_or_else(|| SessionError::Internal("app controller on non-app state".into()))?
                .clone();

            match app.current_dev_state {
                DevState::Idle => {
                    if app.blueprint.is_none() {
                        self.plan_blueprint(session, token).await?;
                    }
                    set_dev_state(session, DevState::PhaseGenerating)?;
                }
                DevState::PhaseGenerating => {
                    if app.phases_counter >= MAX_PHASES {
                        set_dev_state(session, DevState::Reviewing)?;
                        continue;
                    }
                    match self.next_phase(session, token).await? {
                        Some(phase) => {
                            session.broadcast(SessionEvent::PhaseGenerating {
                                phase_name: phase.name.clone(),
                            });
                            session
                                .mutate(|s| {
                                    if let Some(app) = s.as_app_mut() {
                                        if !app
                                            .generated_phases
                                            .iter()
                                            .any(|p| p.concept.name == phase.name)
                                        {
                                            app.generated_phases.push(
                                                forge_contract::GeneratedPhase {
                                                    concept: phase.clone(),
                                                    completed: false,
                                                },
                                            );
                                        }
                                        app.current_phase = Some(phase.clone());
                                    }
                                })
                                .await;
                            session.broadcast(SessionEvent::PhaseGenerated {
                                phase_name: phase.name.clone(),
                                files: phase.files.iter().map(|f| f.path.clone()).collect(),
                            });
                            set_dev_state(session, DevState::PhaseImplementing)?;
                        }
                        None => set_dev_state(session, DevState::Reviewing)?,
                    }
                }
                DevState::PhaseImplementing => {
                    let phase = match app.current_phase.clone().or_else(|| {
                        app.generated_phases
                            .iter()
                            .find(|p| !p.completed)
                            .map(|p| p.concept.clone())
                    }) {
                        Some(phase) => phase,
                        None => {
                            set_dev_state(session, DevState::Reviewing)?;
                            continue;
                        }
                    };
                    self.implement_phase(session, token, &phase).await?;

                    let counter = session.state.read(|s| {
                        s.as_app().map(|a| a.phases_counter).unwrap_or_default()
                    });
                    if phase.last_phase || counter >= MAX_PHASES {
                        set_dev_state(session, DevState::Reviewing)?;
                    } else {
                        set_dev_state(session, DevState::PhaseGenerating)?;
                    }
                }
                DevState::Reviewing => {
                    let clean = self.review_cycle(session, token).await?;
                    if clean {
                        set_dev_state(session, DevState::Finalizing)?;
                    }
                }
                DevState::Finalizing => {
                    let hooks = session.broadcast_hooks();
                    let deploy = session.deploy.deploy_to_sandbox(
                        SandboxDeployArgs {
                            redeploy: true,
                            ..Default::default()
                        },
                        &hooks,
                    );
                    match await_or_cancel(token, deploy).await {
                        CancelAware::Cancelled => return Err(SessionError::Cancelled),
                        CancelAware::Value(Err(e)) => {
                            debug!(error = %e, "final deploy failed");
                        }
                        CancelAware::Value(Ok(_)) => {}
                    }
                    set_dev_state(session, DevState::Idle)?;
                    info!("app generation finished");
                    return Ok(());
                }
            }
        }
    }

    async fn user_suggestion(
        &self,
        session: &Arc<SessionAgent>,
        input: PendingUserInput,
    ) -> Result<(), SessionError> {
        // Queued only; the phase boundary drains it into the conversation.
        session
            .mutate(|s| s.base.pending_user_inputs.push(input))
            .await;
        Ok(())
    }

    async fn capture_screenshot(&self, _session: &Arc<SessionAgent>) -> Result<(), SessionError> {
        Err(SessionError::Validation(
            "screenshot capture requires an attached capture service".into(),
        ))
    }
}

impl AppController {
    async fn plan_blueprint(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<Blueprint, SessionError> {
        let state = session.state.snapshot();
        let mut messages = vec![
            InferenceMessage::system(BLUEPRINT_SYSTEM_PROMPT),
            InferenceMessage::user(format!(
                "Project request: {}\nRespond with a single JSON object.",
                state.base.query
            )),
        ];
        if state.base.agent_mode == AgentMode::Smart {
            messages.extend(conversation_context(&state));
        }

        let response = match await_or_cancel(
            token,
            session.inference.execute(InferenceRequest {
                messages,
                tools: Vec::new(),
            }),
        )
        .await
        {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(r) => r.map_err(|e| SessionError::Inference(e.to_string()))?,
        };

        let blueprint = response
            .text
            .as_deref()
            .and_then(parse_json_block)
            .and_then(|v| serde_json::from_value::<Blueprint>(v).ok())
            .unwrap_or_else(|| fallback_blueprint(&state.base.query, session));

        session
            .mutate(|s| {
                if let Some(app) = s.as_app_mut() {
                    app.blueprint = Some(blueprint.clone());
                }
            })
            .await;
        Ok(blueprint)
    }

    /// The next unit of work: a phase left incomplete by a stopped run, the
    /// next planned blueprint phase, or (smart mode) a freshly planned one.
    async fn next_phase(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<Option<PhaseConcept>, SessionError> {
        let state = session.state.snapshot();
        let app = state.as_app().cloned().unwrap_or_default();

        if let Some(pending) = app.generated_phases.iter().find(|p| !p.completed) {
            return Ok(Some(pending.concept.clone()));
        }

        let planned = app
            .blueprint
            .as_ref()
            .map(|b| b.phases.clone())
            .unwrap_or_default();
        if let Some(concept) = planned.get(app.generated_phases.len()) {
            return Ok(Some(concept.clone()));
        }

        if state.base.agent_mode == AgentMode::Deterministic {
            return Ok(None);
        }

        let mut messages = vec![
            InferenceMessage::system(PHASE_SYSTEM_PROMPT),
            InferenceMessage::user(format!(
                "Project request: {}\nCompleted phases: {}\nPropose the next phase as JSON, or reply DONE.",
                state.base.query,
                app.generated_phases
                    .iter()
                    .map(|p| p.concept.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        ];
        messages.extend(conversation_context(&state));

        let response = match await_or_cancel(
            token,
            session.inference.execute(InferenceRequest {
                messages,
                tools: Vec::new(),
            }),
        )
        .await
        {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(r) => r.map_err(|e| SessionError::Inference(e.to_string()))?,
        };

        Ok(response
            .text
            .as_deref()
            .filter(|t| !t.trim().eq_ignore_ascii_case("done"))
            .and_then(parse_json_block)
            .and_then(|v| serde_json::from_value::<PhaseConcept>(v).ok()))
    }

    async fn implement_phase(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
        phase: &PhaseConcept,
    ) -> Result<(), SessionError> {
        session.broadcast(SessionEvent::PhaseImplementing {
            phase_name: phase.name.clone(),
        });
        session
            .plugins
            .before_files_generated(&session.plugin_ctx(), &phase.name, &phase.files)
            .await;

        let mut outputs = Vec::with_capacity(phase.files.len());
        for concept in &phase.files {
            outputs.push(self.generate_file(session, token, phase, concept).await?);
        }

        session
            .files
            .save_files(outputs.clone(), &format!("implement phase: {}", phase.name))?;
        for file in &outputs {
            session.broadcast(SessionEvent::FileGenerated {
                file_path: file.file_path.clone(),
                file_purpose: file.file_purpose.clone(),
            });
        }
        session.broadcast(SessionEvent::PhaseImplemented {
            phase_name: phase.name.clone(),
        });
        session
            .plugins
            .after_files_generated(&session.plugin_ctx(), &phase.name, &outputs)
            .await;

        // Phase boundary: mark progress and drain queued user inputs.
        let drained = session
            .mutate(|s| {
                if let Some(app) = s.as_app_mut() {
                    if let Some(record) = app
                        .generated_phases
                        .iter_mut()
                        .find(|p| p.concept.name == phase.name)
                    {
                        record.completed = true;
                    }
                    app.phases_counter += 1;
                    app.mvp_generated = true;
                    app.current_phase = None;
                }
                std::mem::take(&mut s.base.pending_user_inputs)
            })
            .await;
        for input in drained {
            session
                .conversation
                .add_message(ConversationMessage::user(input.text))
                .await;
        }

        let hooks = session.broadcast_hooks();
        let deploy = session
            .deploy
            .deploy_to_sandbox(SandboxDeployArgs::default(), &hooks);
        match await_or_cancel(token, deploy).await {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(Err(e)) => debug!(error = %e, "phase deploy failed"),
            CancelAware::Value(Ok(_)) => {}
        }
        Ok(())
    }

    async fn generate_file(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
        phase: &PhaseConcept,
        concept: &FileConcept,
    ) -> Result<FileRecord, SessionError> {
        session.broadcast(SessionEvent::FileGenerating {
            file_path: concept.path.clone(),
        });

        let state = session.state.snapshot();
        let existing = state
            .base
            .generated_files
            .get(&concept.path)
            .map(|f| f.file_contents.clone());
        let mut messages = vec![
            InferenceMessage::system(FILE_SYSTEM_PROMPT),
            InferenceMessage::user(file_prompt(&state.base.query, phase, concept, existing)),
        ];
        if state.base.agent_mode == AgentMode::Smart {
            messages.extend(conversation_context(&state));
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let forwarder = {
            let session = session.clone();
            let path = concept.path.clone();
            tokio::spawn(async move {
                while let Some(chunk) = rx.recv().await {
                    session.broadcast(SessionEvent::FileChunkGenerated {
                        file_path: path.clone(),
                        chunk,
                    });
                }
            })
        };

        let response = match await_or_cancel(
            token,
            session.inference.execute_stream(
                InferenceRequest {
                    messages,
                    tools: Vec::new(),
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

        let contents = strip_code_fence(response.text.as_deref().unwrap_or_default());
        Ok(FileRecord::new(concept.path.clone(), contents).with_purpose(concept.purpose.clone()))
    }

    /// One review pass. Returns `true` when no more fixes are needed.
    async fn review_cycle(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<bool, SessionError> {
        session
            .mutate(|s| {
                if let Some(app) = s.as_app_mut() {
                    app.reviewing_initiated = true;
                }
            })
            .await;

        let analysis = match await_or_cancel(token, session.deploy.run_static_analysis(None)).await
        {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(a) => a,
        };
        if analysis.success {
            session.broadcast(SessionEvent::StaticAnalysisResults {
                lint_issues: analysis.lint_issues.clone(),
                type_issues: analysis.type_issues.clone(),
            });
        }

        let runtime = match await_or_cancel(token, session.deploy.fetch_runtime_errors(true)).await
        {
            CancelAware::Cancelled => return Err(SessionError::Cancelled),
            CancelAware::Value(r) => r,
        };
        if !runtime.errors.is_empty() {
            session.broadcast(SessionEvent::RuntimeErrorFound {
                errors: runtime.errors.clone(),
            });
        }

        let known_paths: Vec<String> = session
            .state
            .read(|s| s.base.generated_files.keys().cloned().collect());
        let mut affected: Vec<String> = analysis
            .lint_issues
            .iter()
            .chain(analysis.type_issues.iter())
            .map(|i| i.file_path.clone())
            .chain(runtime.errors.iter().filter_map(|e| e.source_file.clone()))
            .filter(|p| known_paths.contains(p))
            .collect();
        affected.sort();
        affected.dedup();

        let review_cycles = session
            .state
            .read(|s| s.as_app().map(|a| a.review_cycles).unwrap_or_default());
        if affected.is_empty() || review_cycles >= MAX_REVIEW_CYCLES {
            return Ok(true);
        }

        let issue_digest = review_digest(&analysis.lint_issues, &runtime.errors);
        let mut fixed = Vec::with_capacity(affected.len());
        for path in &affected {
            let Some(current) = session.files.get_file(path) else {
                continue;
            };
            let response = match await_or_cancel(
                token,
                session.inference.execute(InferenceRequest {
                    messages: vec![
                        InferenceMessage::system(FILE_SYSTEM_PROMPT),
                        InferenceMessage::user(format!(
                            "Fix `{path}` so the reported issues go away.\n\nIssues:\n{issue_digest}\n\nCurrent contents:\n{}",
                            current.file_contents
                        )),
                    ],
                    tools: Vec::new(),
                }),
            )
            .await
            {
                CancelAware::Cancelled => return Err(SessionError::Cancelled),
                CancelAware::Value(r) => r.map_err(|e| SessionError::Inference(e.to_string()))?,
            };
            let contents = strip_code_fence(response.text.as_deref().unwrap_or_default());
            if contents.is_empty() {
                continue;
            }
            fixed.push(
                FileRecord::new(path.clone(), contents).with_purpose(current.file_purpose),
            );
        }

        if !fixed.is_empty() {
            let cycle = review_cycles + 1;
            session
                .files
                .save_files(fixed.clone(), &format!("review fixes, cycle {cycle}"))?;
            for file in &fixed {
                session.broadcast(SessionEvent::FileGenerated {
                    file_path: file.file_path.clone(),
                    file_purpose: file.file_purpose.clone(),
                });
            }
        }
        session
            .mutate(|s| {
                if let Some(app) = s.as_app_mut() {
                    app.review_cycles += 1;
                }
            })
            .await;
        Ok(false)
    }
}

fn set_dev_state(session: &Arc<SessionAgent>, to: DevState) -> Result<(), SessionError> {
    let mut violation = None;
    session.state.update(|s| {
        if let Some(app) = s.as_app_mut() {
            if can_transition(app.current_dev_state, to) {
                app.current_dev_state = to;
            } else {
                violation = Some(app.current_dev_state);
            }
        }
    });
    match violation {
        Some(from) => Err(SessionError::Internal(format!(
            "illegal dev-state transition {from:?} -> {to:?}"
        ))),
        None => Ok(()),
    }
}

fn conversation_context(state: &forge_contract::SessionState) -> Vec<InferenceMessage> {
    let mut messages: Vec<InferenceMessage> = state
        .base
        .conversation
        .iter()
        .map(|m| match m.role {
            forge_contract::Role::User => InferenceMessage::user(m.content.clone()),
            forge_contract::Role::Assistant => InferenceMessage::assistant(m.content.clone()),
            _ => InferenceMessage::system(m.content.clone()),
        })
        .collect();
    if !state.base.project_updates.is_empty() {
        messages.push(InferenceMessage::system(format!(
            "Project updates so far:\n- {}",
            state.base.project_updates.join("\n- ")
        )));
    }
    messages
}

fn fallback_blueprint(query: &str, session: &Arc<SessionAgent>) -> Blueprint {
    let entry = session
        .scaffold_important_files()
        .into_iter()
        .next()
        .unwrap_or_else(|| "src/main.tsx".to_string());
    Blueprint {
        title: query.to_string(),
        description: String::new(),
        frameworks: vec!["react".into()],
        phases: vec![PhaseConcept {
            name: "mvp".into(),
            description: format!("Build the first working version of: {query}"),
            files: vec![FileConcept {
                path: entry,
                purpose: "application entry point".into(),
            }],
            last_phase: true,
        }],
    }
}

fn file_prompt(
    query: &str,
    phase: &PhaseConcept,
    concept: &FileConcept,
    existing: Option<String>,
) -> String {
    let mut prompt = format!(
        "Project request: {query}\nPhase: {}: {}\nWrite the complete contents of `{}` ({}).",
        phase.name, phase.description, concept.path, concept.purpose
    );
    if let Some(existing) = existing {
        prompt.push_str(&format!("\n\nCurrent contents to evolve:\n{existing}"));
    }
    prompt.push_str("\nRespond with the file contents only.");
    prompt
}

fn review_digest(
    lint_issues: &[forge_contract::LintIssue],
    runtime_errors: &[forge_contract::RuntimeError],
) -> String {
    let mut out = String::new();
    for issue in lint_issues {
        out.push_str(&format!(
            "- {}:{} {}\n",
            issue.file_path, issue.line, issue.message
        ));
    }
    for error in runtime_errors {
        out.push_str(&format!("- runtime: {}\n", error.message));
    }
    out
}

/// Extract a JSON object from model output that may be fenced or surrounded
/// by prose.
pub fn parse_json_block(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Some(v);
    }
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim);
    if let Some(inner) = without_fence {
        if let Ok(v) = serde_json::from_str(inner) {
            return Some(v);
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Strip a wrapping markdown code fence from generated file contents.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let body = trimmed
        .splitn(2, '\n')
        .nth(1)
        .unwrap_or_default()
        .strip_suffix("```")
        .map(str::trim_end)
        .unwrap_or_else(|| trimmed.splitn(2, '\n').nth(1).unwrap_or_default());
    body.trim_start_matches('\n').to_string()
}

const BLUEPRINT_SYSTEM_PROMPT: &str = "You plan small web applications. Given a project request, \
produce a JSON blueprint: {\"title\", \"description\", \"frameworks\", \"phases\": [{\"name\", \
\"description\", \"files\": [{\"path\", \"purpose\"}], \"last_phase\"}]}. Keep phases small and \
ordered; mark the final phase with last_phase=true.";

const PHASE_SYSTEM_PROMPT: &str = "You plan the next increment of a small web application. \
Respond with one JSON phase object {\"name\", \"description\", \"files\": [{\"path\", \
\"purpose\"}], \"last_phase\"} or the single word DONE.";

const FILE_SYSTEM_PROMPT: &str = "You write complete, self-contained source files for small web \
applications. Respond with the file contents only, without commentary or markdown fences.";
