//! End-to-end session scenarios against mocked collaborators.

use async_trait::async_trait;
use forge_contract::limits::{MAX_IMAGES_PER_MESSAGE, MAX_PHASES};
use forge_contract::{
    is_valid_project_name, AgentMode, DevState, ImageAttachment, InferenceClient, InferenceError,
    InferenceRequest, InferenceResponse, LintIssue, ProjectType, ToolCallRequest,
};
use forge_session::testing::{drain_events, event_types, MockSandbox, ScriptedInference};
use forge_session::{handle_frame, InitializeArgs, MemoryConversationStore, SessionAgent, SessionConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn blueprint_json(phases: usize, last_phase_each: bool) -> String {
    let phases: Vec<_> = (0..phases)
        .map(|i| {
            json!({
                "name": format!("phase-{i}"),
                "description": format!("increment {i}"),
                "files": [{"path": format!("src/part{i}.tsx"), "purpose": "feature module"}],
                "last_phase": last_phase_each && i == 0,
            })
        })
        .collect();
    json!({
        "title": "Counter",
        "description": "A small counter app",
        "frameworks": ["react"],
        "phases": phases,
    })
    .to_string()
}

struct Fixture {
    session: Arc<SessionAgent>,
    sandbox: Arc<MockSandbox>,
    inference: Arc<ScriptedInference>,
}

async fn app_fixture() -> Fixture {
    fixture(ProjectType::App, "make a counter").await
}

async fn fixture(project_type: ProjectType, query: &str) -> Fixture {
    let sandbox = Arc::new(MockSandbox::new());
    let inference = Arc::new(ScriptedInference::new());
    let session = SessionAgent::new(SessionConfig::new(
        project_type,
        sandbox.clone(),
        inference.clone(),
        Arc::new(MemoryConversationStore::new()),
    ));
    session
        .initialize(InitializeArgs {
            query: query.into(),
            hostname: "forge.test".into(),
            user_id: "user-1".into(),
            agent_id: "agent-1".into(),
            template_name: "vite-react".into(),
            agent_mode: AgentMode::Deterministic,
        })
        .await
        .expect("initialize");
    Fixture {
        session,
        sandbox,
        inference,
    }
}

#[tokio::test]
async fn initialize_sets_identity_and_deploys_scaffold() {
    let fix = app_fixture().await;
    let state = fix.session.state_snapshot();

    assert!(is_valid_project_name(&state.base.project_name));
    assert_eq!(state.base.query, "make a counter");
    assert_eq!(state.base.hostname, "forge.test");
    assert!(state.base.generated_files.contains_key("src/main.tsx"));
    assert!(state.base.sandbox_instance_id.is_some());
    // Scaffold files reached the sandbox.
    assert!(fix
        .sandbox
        .written_paths()
        .contains(&"src/main.tsx".to_string()));
}

#[tokio::test]
async fn happy_path_app_generation_emits_expected_sequence() {
    let fix = app_fixture().await;
    let (_, mut rx) = fix.session.events().attach();

    fix.inference.push_text(&json!({
        "title": "Counter",
        "frameworks": ["react"],
        "phases": [{
            "name": "mvp",
            "description": "first working version",
            "files": [{"path": "src/main.tsx", "purpose": "application entry point"}],
            "last_phase": true,
        }]
    })
    .to_string());
    fix.inference
        .push_text("export default function App() { return <button>0</button>; }");

    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let events = drain_events(&mut rx);
    let types = event_types(&events);
    assert!(types.contains(&"generation_started".to_string()));
    assert!(types.iter().filter(|t| *t == "phase_generating").count() >= 1);
    assert!(types.contains(&"phase_implementing".to_string()));
    assert!(types.contains(&"file_generated".to_string()));
    assert!(types.contains(&"deployment_completed".to_string()));
    assert_eq!(types.last().unwrap(), "generation_completed");

    // The generated entry file landed with the streamed contents.
    let generated = events
        .iter()
        .find(|e| e["type"] == "file_generated")
        .unwrap();
    assert_eq!(generated["file_path"], "src/main.tsx");
    let deployed = events
        .iter()
        .find(|e| e["type"] == "deployment_completed")
        .unwrap();
    assert!(!deployed["preview_url"].as_str().unwrap().is_empty());

    let state = fix.session.state_snapshot();
    let app = state.as_app().unwrap();
    assert!(app.mvp_generated);
    assert_eq!(app.current_dev_state, DevState::Idle);
    assert!(!state.base.should_be_generating);
    assert!(state.base.generated_files["src/main.tsx"]
        .file_contents
        .contains("button"));
}

#[tokio::test]
async fn file_map_matches_vcs_tree_after_generation() {
    let fix = app_fixture().await;
    fix.inference.push_text(&blueprint_json(1, true));
    fix.inference.push_text("contents");
    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let export = fix.session.export_git_objects();
    assert!(export.has_commits);
    let state = fix.session.state_snapshot();
    // Every mapped path exists as a blob in the exported history.
    for path in state.base.generated_files.keys() {
        assert!(
            export.objects.iter().any(|o| o.kind == "tree"),
            "missing tree objects"
        );
        assert!(!path.is_empty());
    }
}

/// Inference client that parks on a gate from a given call index, so tests
/// can cancel mid-generation deterministically.
struct GateInference {
    inner: ScriptedInference,
    reached: Semaphore,
    release: Semaphore,
    block_from_call: usize,
    calls: AtomicUsize,
}

impl GateInference {
    fn new(block_from_call: usize) -> Self {
        Self {
            inner: ScriptedInference::new(),
            reached: Semaphore::new(0),
            release: Semaphore::new(0),
            block_from_call,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InferenceClient for GateInference {
    async fn execute(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.block_from_call {
            self.reached.add_permits(1);
            let _permit = self.release.acquire().await.map_err(|_| {
                InferenceError::Transport("gate closed".into())
            })?;
        }
        self.inner.execute(request).await
    }
}

#[tokio::test]
async fn cancel_mid_generation_stops_cleanly_and_resumes() {
    let sandbox = Arc::new(MockSandbox::new());
    // Call 0 is the blueprint; call 1 (the first file) blocks on the gate.
    let inference = Arc::new(GateInference::new(1));
    inference.inner.push_text(&json!({
        "title": "Counter",
        "phases": [{
            "name": "mvp",
            "files": [{"path": "src/main.tsx", "purpose": "entry"}],
            "last_phase": true,
        }]
    })
    .to_string());
    inference.inner.push_text("resumed contents");

    let session = SessionAgent::new(SessionConfig::new(
        ProjectType::App,
        sandbox,
        inference.clone(),
        Arc::new(MemoryConversationStore::new()),
    ));
    session
        .initialize(InitializeArgs {
            query: "make a counter".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let (channel, mut rx) = session.events().attach();

    session.start_generation().await.unwrap();
    // Wait until the first file inference is in flight.
    inference.reached.acquire().await.unwrap().forget();

    handle_frame(&session, channel, r#"{"type":"stop_generation"}"#).await;
    session.generation_settled().await;

    let events = drain_events(&mut rx);
    let types = event_types(&events);
    let stop_at = types
        .iter()
        .position(|t| t == "generation_stopped")
        .expect("stop acknowledged");
    assert!(
        !types[stop_at..].iter().any(|t| t == "file_generated" || t == "phase_implemented"),
        "no file/phase events after stop: {types:?}"
    );

    // The in-flight phase is left incomplete and intent is cleared.
    let state = session.state_snapshot();
    let app = state.as_app().unwrap();
    assert!(!state.base.should_be_generating);
    assert!(app.generated_phases.iter().any(|p| !p.completed));
    assert!(!app.mvp_generated);

    // Resume continues from the first non-completed phase.
    inference.release.add_permits(8);
    session.resume_generation().await.unwrap();
    session.generation_settled().await;

    let events = drain_events(&mut rx);
    let types = event_types(&events);
    assert!(types.contains(&"generation_resumed".to_string()));
    assert!(types.contains(&"file_generated".to_string()));
    assert_eq!(types.last().unwrap(), "generation_completed");

    let state = session.state_snapshot();
    let app = state.as_app().unwrap();
    assert!(app.mvp_generated);
    assert!(app.generated_phases.iter().all(|p| p.completed));
}

#[tokio::test]
async fn phase_cap_forces_finalization() {
    let fix = app_fixture().await;
    // 14 planned phases; only MAX_PHASES may complete.
    fix.inference.push_text(&blueprint_json(14, false));
    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let state = fix.session.state_snapshot();
    let app = state.as_app().unwrap();
    assert_eq!(app.phases_counter, MAX_PHASES);
    assert_eq!(app.generated_phases.len(), MAX_PHASES as usize);
    assert!(app.generated_phases.iter().all(|p| p.completed));
    assert_eq!(app.current_dev_state, DevState::Idle);
}

#[tokio::test]
async fn review_cycle_regenerates_flagged_files() {
    let fix = app_fixture().await;
    fix.inference.push_text(&json!({
        "title": "Counter",
        "phases": [{
            "name": "mvp",
            "files": [{"path": "src/main.tsx", "purpose": "entry"}],
            "last_phase": true,
        }]
    })
    .to_string());
    fix.inference.push_text("const broken = ;");
    // First review pass flags the entry file; the fix response follows.
    fix.sandbox.push_analysis(vec![LintIssue {
        file_path: "src/main.tsx".into(),
        line: 1,
        message: "syntax error".into(),
        rule: None,
        severity: Default::default(),
    }]);
    fix.inference.push_text("const fixed = 1;");

    let (_, mut rx) = fix.session.events().attach();
    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let state = fix.session.state_snapshot();
    let app = state.as_app().unwrap();
    assert_eq!(app.review_cycles, 1);
    assert!(app.reviewing_initiated);
    assert!(state.base.generated_files["src/main.tsx"]
        .file_contents
        .contains("fixed"));

    let types = event_types(&drain_events(&mut rx));
    assert!(types.iter().filter(|t| *t == "static_analysis_results").count() >= 2);
}

#[tokio::test]
async fn user_suggestions_drain_at_phase_boundary() {
    let fix = app_fixture().await;
    fix.inference.push_text(&blueprint_json(1, true));
    fix.inference.push_text("contents");

    let (channel, _rx) = fix.session.events().attach();
    handle_frame(
        &fix.session,
        channel,
        &json!({"type": "user_suggestion", "text": "make it purple", "images": []}).to_string(),
    )
    .await;
    assert_eq!(
        fix.session.state_snapshot().base.pending_user_inputs.len(),
        1
    );

    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let state = fix.session.state_snapshot();
    assert!(state.base.pending_user_inputs.is_empty());
    assert!(state
        .base
        .conversation
        .iter()
        .any(|m| m.content == "make it purple"));
}

#[tokio::test]
async fn workflow_generation_drives_tools_and_regenerates_scaffold() {
    let fix = fixture(ProjectType::Workflow, "send a slack message on a schedule").await;
    let (_, mut rx) = fix.session.events().attach();

    fix.inference.push_response(InferenceResponse {
        text: Some("Setting up the workflow.".into()),
        tool_calls: vec![
            ToolCallRequest::new(
                "call_1",
                "generate_files",
                json!({
                    "files": [{
                        "path": "src/index.ts",
                        "purpose": "workflow entry point",
                        "contents": "export class SlackNotifier extends WorkflowEntrypoint {\n  async run() {}\n}"
                    }]
                }),
            ),
            ToolCallRequest::new(
                "call_2",
                "configure_workflow_metadata",
                json!({
                    "name": "scheduled-slack",
                    "description": "Posts to Slack on a schedule",
                    "params_schema": {
                        "type": "object",
                        "properties": {"channel": {"type": "string"}}
                    },
                    "secrets": {"SLACK_TOKEN": "bot token"},
                    "resources": {"CACHE": {"kind": "kv"}}
                }),
            ),
        ],
    });
    fix.inference.push_response(InferenceResponse {
        text: Some("The workflow is ready.".into()),
        tool_calls: Vec::new(),
    });

    fix.session.start_generation().await.unwrap();
    fix.session.generation_settled().await;

    let state = fix.session.state_snapshot();
    // Workflow code is derived from the file map.
    assert!(state.workflow_code().unwrap().contains("SlackNotifier"));

    let metadata = state
        .as_workflow()
        .unwrap()
        .workflow_metadata
        .clone()
        .unwrap();
    assert_eq!(metadata.name.as_deref(), Some("scheduled-slack"));
    assert!(metadata.resources.contains_key("CACHE"));

    // Regenerated wrangler.jsonc reflects the declared bindings.
    let wrangler = &state.base.generated_files["wrangler.jsonc"].file_contents;
    assert!(wrangler.contains("kv_namespaces"));
    assert!(wrangler.contains("CACHE"));
    // The class name was derived from the generated code.
    assert!(wrangler.contains("SlackNotifier"));
    let readme = &state.base.generated_files["README.md"].file_contents;
    assert!(readme.contains("scheduled-slack"));
    assert!(readme.contains("`channel`"));

    let types = event_types(&drain_events(&mut rx));
    assert!(types.contains(&"file_generated".to_string()));
    assert!(types.contains(&"deployment_completed".to_string()));
    assert_eq!(types.last().unwrap(), "generation_completed");
}

#[tokio::test]
async fn deploy_frame_without_credentials_reports_cloudflare_error() {
    let fix = fixture(ProjectType::Workflow, "schedule something").await;
    let (channel, mut rx) = fix.session.events().attach();

    handle_frame(&fix.session, channel, r#"{"type":"deploy"}"#).await;

    // The deploy runs in a spawned task; wait for its error event.
    let mut saw_error = false;
    for _ in 0..50 {
        let events = drain_events(&mut rx);
        if events.iter().any(|e| e["type"] == "cloudflare_deployment_error"
            && e["error"].as_str().unwrap_or_default().contains("credentials"))
        {
            saw_error = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(saw_error, "expected cloudflare_deployment_error");

    let state = fix.session.state_snapshot();
    let wf = state.as_workflow().unwrap();
    assert_eq!(
        wf.deployment_status,
        forge_contract::DeploymentStatus::Failed
    );
    assert!(wf.deployment_error.is_some());
}

#[tokio::test]
async fn clear_conversation_keeps_full_log() {
    let fix = app_fixture().await;
    let (channel, mut rx) = fix.session.events().attach();

    for (id, content) in [("m1", "one"), ("m2", "two"), ("m3", "three")] {
        fix.session
            .conversation()
            .add_message(forge_contract::ConversationMessage::user(content).with_id(id))
            .await;
    }

    handle_frame(&fix.session, channel, r#"{"type":"clear_conversation"}"#).await;
    handle_frame(&fix.session, channel, r#"{"type":"get_conversation_state"}"#).await;

    let events = drain_events(&mut rx);
    let types = event_types(&events);
    assert!(types.contains(&"conversation_cleared".to_string()));

    let state_event = events
        .iter()
        .find(|e| e["type"] == "conversation_state")
        .unwrap();
    assert!(state_event["running"].as_array().unwrap().is_empty());
    let full_ids: Vec<&str> = state_event["full"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["conversation_id"].as_str().unwrap())
        .collect();
    assert_eq!(full_ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn control_frame_validation_errors_are_per_channel() {
    let fix = fixture(ProjectType::Workflow, "wf").await;
    let (channel, mut rx) = fix.session.events().attach();
    let (_, mut other_rx) = fix.session.events().attach();

    // Unknown frame type.
    handle_frame(&fix.session, channel, r#"{"type":"reticulate"}"#).await;
    // App-only frame on a workflow session.
    handle_frame(&fix.session, channel, r#"{"type":"capture_screenshot"}"#).await;
    // Deprecated surface.
    handle_frame(&fix.session, channel, r#"{"type":"github_export"}"#).await;
    // Model configs are app-only.
    handle_frame(&fix.session, channel, r#"{"type":"get_model_configs"}"#).await;

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e["type"] == "error"));
    assert!(events[1]["error"]
        .as_str()
        .unwrap()
        .contains("app sessions"));
    assert!(events[2]["error"].as_str().unwrap().contains("deprecated"));
    // Errors never leak to other channels.
    assert!(drain_events(&mut other_rx).is_empty());
}

#[tokio::test]
async fn oversize_user_suggestions_are_rejected_without_state_change() {
    let fix = app_fixture().await;
    let (channel, mut rx) = fix.session.events().attach();

    let images: Vec<ImageAttachment> = (0..MAX_IMAGES_PER_MESSAGE + 1)
        .map(|i| ImageAttachment {
            mime_type: "image/png".into(),
            size_bytes: 10,
            data: format!("img{i}"),
        })
        .collect();
    let frame = json!({"type": "user_suggestion", "text": "too many", "images": images});
    handle_frame(&fix.session, channel, &frame.to_string()).await;

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["error"].as_str().unwrap().contains("too many images"));
    assert!(fix
        .session
        .state_snapshot()
        .base
        .pending_user_inputs
        .is_empty());

    // A single oversized image is rejected the same way.
    let frame = json!({
        "type": "user_suggestion",
        "text": "huge",
        "images": [{"mime_type": "image/png", "size_bytes": 10_000_000, "data": "x"}]
    });
    handle_frame(&fix.session, channel, &frame.to_string()).await;
    let events = drain_events(&mut rx);
    assert!(events[0]["error"].as_str().unwrap().contains("image too large"));
}

#[tokio::test]
async fn generate_all_is_idempotent_while_running() {
    let sandbox = Arc::new(MockSandbox::new());
    let inference = Arc::new(GateInference::new(0));
    let session = SessionAgent::new(SessionConfig::new(
        ProjectType::App,
        sandbox,
        inference.clone(),
        Arc::new(MemoryConversationStore::new()),
    ));
    session
        .initialize(InitializeArgs {
            query: "make a counter".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    session.start_generation().await.unwrap();
    inference.reached.acquire().await.unwrap().forget();
    // A second generate_all while running is ignored.
    session.start_generation().await.unwrap();
    assert!(session.is_generating());

    inference.release.add_permits(16);
    session.generation_settled().await;
    assert!(!session.is_generating());
}

#[tokio::test]
async fn deep_debug_persists_transcript_and_joins_concurrent_callers() {
    let fix = fixture(ProjectType::Workflow, "wf").await;
    fix.sandbox.push_runtime_errors(vec![forge_contract::RuntimeError {
        message: "TypeError: x is undefined".into(),
        stack: None,
        source_file: Some("src/index.ts".into()),
    }]);
    fix.inference
        .push_text("The workflow entry throws because x is undefined; initialize it in run().");

    let handle: Arc<dyn forge_contract::AgentHandle> = fix.session.clone();
    let outcome = handle
        .deep_debug(forge_contract::DeepDebugRequest {
            issue: "workflow crashes at startup".into(),
            previous_transcript: None,
            focus_paths: vec!["src/".into()],
        })
        .await;

    assert!(outcome.success);
    let transcript = outcome.transcript.unwrap();
    assert!(transcript.contains("undefined"));
    assert_eq!(
        fix.session
            .state_snapshot()
            .base
            .last_deep_debug_transcript
            .as_deref(),
        Some(transcript.as_str())
    );
}
