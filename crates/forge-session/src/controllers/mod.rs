//! Project-type controllers and their dispatcher (C10, C11, C13).

mod app;
mod workflow;

pub use app::{can_transition, parse_json_block, strip_code_fence, AppController};
pub use workflow::WorkflowController;

use crate::session::SessionAgent;
use async_trait::async_trait;
use forge_contract::{OperationToken, PendingUserInput, ProjectType, SessionError};
use std::sync::Arc;

/// The project-type-specific brain behind a session.
///
/// Controllers hold no state of their own; everything they need lives in
/// the session record, so a controller survives rehydration for free.
#[async_trait]
pub trait ProjectController: Send + Sync {
    fn project_type(&self) -> ProjectType;

    /// Run one full generation pass. Observes `token` at every suspension
    /// point and returns [`SessionError::Cancelled`] when aborted.
    async fn generate(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<(), SessionError>;

    /// Continue from where a stopped generation left off.
    async fn resume(
        &self,
        session: &Arc<SessionAgent>,
        token: &OperationToken,
    ) -> Result<(), SessionError> {
        self.generate(session, token).await
    }

    /// Accept a queued user suggestion.
    async fn user_suggestion(
        &self,
        session: &Arc<SessionAgent>,
        input: PendingUserInput,
    ) -> Result<(), SessionError>;

    /// Capture a screenshot of the running preview.
    async fn capture_screenshot(&self, _session: &Arc<SessionAgent>) -> Result<(), SessionError> {
        Err(SessionError::Validation(
            "capture_screenshot is only available for app sessions".into(),
        ))
    }
}

/// The only place that knows both variants: route a session to its
/// controller by project type.
pub fn controller_for(project_type: ProjectType) -> Arc<dyn ProjectController> {
    match project_type {
        ProjectType::App => Arc::new(AppController),
        ProjectType::Workflow => Arc::new(WorkflowController),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_matches_project_type() {
        assert_eq!(
            controller_for(ProjectType::App).project_type(),
            ProjectType::App
        );
        assert_eq!(
            controller_for(ProjectType::Workflow).project_type(),
            ProjectType::Workflow
        );
    }
}
