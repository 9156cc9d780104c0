//! External export flow: push the session's git objects to a remote
//! repository host.

use crate::session::SessionAgent;
use forge_contract::{GitHubPushRequest, SessionError, SessionEvent};
use std::sync::Arc;
use tracing::info;

/// Push the session history to the external repository host, narrating the
/// export on the event bus.
pub async fn push_to_github(
    session: &Arc<SessionAgent>,
    request: GitHubPushRequest,
) -> Result<String, SessionError> {
    session.broadcast(SessionEvent::GithubExportStarted);

    let export = session.export_git_objects();
    if !export.has_commits {
        let error = "nothing to export: the session has no commits".to_string();
        session.broadcast(SessionEvent::GithubExportError {
            error: error.clone(),
        });
        return Err(SessionError::Export(error));
    }

    let Some(client) = session.export_client() else {
        let error = "export client not configured".to_string();
        session.broadcast(SessionEvent::GithubExportError {
            error: error.clone(),
        });
        return Err(SessionError::Export(error));
    };

    session.broadcast(SessionEvent::GithubExportProgress {
        message: format!("uploading {} objects", export.objects.len()),
    });
    let response = client.push(&request, &export).await;
    if !response.success {
        let error = response
            .error
            .unwrap_or_else(|| "repository push failed".into());
        session.broadcast(SessionEvent::GithubExportError {
            error: error.clone(),
        });
        return Err(SessionError::Export(error));
    }

    let url = response
        .repository_url
        .unwrap_or_else(|| format!("https://github.com/{}", request.repository_name));
    session
        .mutate(|s| {
            s.base
                .project_updates
                .push(format!("exported to {url}"))
        })
        .await;
    session.broadcast(SessionEvent::GithubExportCompleted {
        repository_url: url.clone(),
    });
    info!(repository_url = %url, "github export complete");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InitializeArgs, SessionConfig};
    use crate::storage::MemoryConversationStore;
    use crate::testing::{drain_events, event_types, MockExportClient, MockSandbox, ScriptedInference};
    use std::sync::Arc;

    async fn session_with_export(
        export: Option<Arc<MockExportClient>>,
    ) -> Arc<SessionAgent> {
        let mut config = SessionConfig::new(
            forge_contract::ProjectType::App,
            Arc::new(MockSandbox::new()),
            Arc::new(ScriptedInference::new()),
            Arc::new(MemoryConversationStore::new()),
        );
        if let Some(export) = export {
            config = config.with_export_client(export);
        }
        let session = SessionAgent::new(config);
        session
            .initialize(InitializeArgs {
                query: "make a counter".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn push_emits_lifecycle_events_and_records_url() {
        let export = Arc::new(MockExportClient::default());
        let session = session_with_export(Some(export.clone())).await;
        let (_, mut rx) = session.events().attach();

        let url = push_to_github(
            &session,
            GitHubPushRequest {
                repository_name: "demo-counter".into(),
                description: "generated app".into(),
                private: false,
                token: "gh-token".into(),
            },
        )
        .await
        .unwrap();

        assert!(url.contains("demo-counter"));
        let types = event_types(&drain_events(&mut rx));
        assert_eq!(
            types,
            vec![
                "github_export_started",
                "github_export_progress",
                "github_export_completed"
            ]
        );
        assert_eq!(export.pushes.lock().unwrap().len(), 1);
        assert!(session
            .state_snapshot()
            .base
            .project_updates
            .iter()
            .any(|n| n.contains(&url)));
    }

    #[tokio::test]
    async fn push_without_client_reports_export_error() {
        let session = session_with_export(None).await;
        let (_, mut rx) = session.events().attach();

        let err = push_to_github(
            &session,
            GitHubPushRequest {
                repository_name: "demo".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::Export(_)));
        let types = event_types(&drain_events(&mut rx));
        assert_eq!(types, vec!["github_export_started", "github_export_error"]);
    }
}
