//! Control-message handling (C14).
//!
//! Parses inbound client frames, validates, and invokes the right session
//! or controller method. Every failure surfaces as a per-channel error
//! event; nothing propagates to the transport.

use crate::deploy::SandboxDeployArgs;
use crate::events::ChannelId;
use crate::session::SessionAgent;
use forge_contract::limits::{MAX_IMAGES_PER_MESSAGE, MAX_IMAGE_SIZE_BYTES};
use forge_contract::{
    ControlFrame, PendingUserInput, ProjectType, SessionError, SessionEvent,
};
use std::sync::Arc;
use tracing::debug;

/// Handle one raw frame from `channel`.
pub async fn handle_frame(session: &Arc<SessionAgent>, channel: ChannelId, raw: &str) {
    let frame = match ControlFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => {
            session.events().send_error(channel, e);
            return;
        }
    };
    if let Err(e) = dispatch(session, channel, frame).await {
        match e {
            SessionError::Cancelled => {}
            other => session.events().send_error(channel, other.to_string()),
        }
    }
}

async fn dispatch(
    session: &Arc<SessionAgent>,
    channel: ChannelId,
    frame: ControlFrame,
) -> Result<(), SessionError> {
    debug!(?frame, channel, "control frame");
    match frame {
        ControlFrame::GenerateAll => session.start_generation().await,

        ControlFrame::Preview => {
            let me = session.clone();
            tokio::spawn(async move {
                let hooks = me.broadcast_hooks();
                let _ = me
                    .deploy
                    .deploy_to_sandbox(SandboxDeployArgs::default(), &hooks)
                    .await;
            });
            Ok(())
        }

        ControlFrame::Deploy => {
            let me = session.clone();
            tokio::spawn(async move {
                let hooks = me.cloudflare_hooks();
                let _ = me.deploy.deploy_to_cloudflare(None, &hooks).await;
            });
            Ok(())
        }

        ControlFrame::CaptureScreenshot => {
            require_app(session, "capture_screenshot")?;
            let controller = session
                .controller()
                .ok_or_else(|| SessionError::Internal("controller not attached".into()))?;
            controller.capture_screenshot(session).await
        }

        ControlFrame::StopGeneration => {
            session.stop_generation().await;
            Ok(())
        }

        ControlFrame::ResumeGeneration => {
            require_app(session, "resume_generation")?;
            session.resume_generation().await
        }

        ControlFrame::UserSuggestion { text, images } => {
            require_app(session, "user_suggestion")?;
            if images.len() > MAX_IMAGES_PER_MESSAGE {
                return Err(SessionError::Validation(format!(
                    "too many images: {} (max {MAX_IMAGES_PER_MESSAGE})",
                    images.len()
                )));
            }
            if let Some(oversize) = images.iter().find(|i| i.size_bytes > MAX_IMAGE_SIZE_BYTES) {
                return Err(SessionError::Validation(format!(
                    "image too large: {} bytes (max {MAX_IMAGE_SIZE_BYTES})",
                    oversize.size_bytes
                )));
            }
            let controller = session
                .controller()
                .ok_or_else(|| SessionError::Internal("controller not attached".into()))?;
            controller
                .user_suggestion(session, PendingUserInput { text, images })
                .await
        }

        ControlFrame::ClearConversation => {
            session.conversation.clear_running().await;
            session.broadcast(SessionEvent::ConversationCleared);
            Ok(())
        }

        ControlFrame::GetConversationState => {
            let logs = session.conversation.state().await;
            let deep_debug_session = session
                .state_snapshot()
                .base
                .last_deep_debug_transcript;
            session.events().send_to(
                channel,
                &SessionEvent::ConversationState {
                    logs,
                    deep_debug_session,
                },
            );
            Ok(())
        }

        ControlFrame::GetModelConfigs => {
            require_app(session, "get_model_configs")?;
            session.events().send_to(
                channel,
                &SessionEvent::ModelConfigsInfo {
                    configs: session.model_configs_payload(),
                },
            );
            Ok(())
        }

        ControlFrame::GithubExport => Err(SessionError::Validation(
            "github_export frames are deprecated; use the export API".into(),
        )),
    }
}

fn require_app(session: &Arc<SessionAgent>, frame: &str) -> Result<(), SessionError> {
    if session.project_type() == ProjectType::App {
        Ok(())
    } else {
        Err(SessionError::Validation(format!(
            "{frame} is only available for app sessions"
        )))
    }
}
