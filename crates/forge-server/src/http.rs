//! HTTP surface: session creation (NDJSON bootstrap stream) and health.

use crate::service::{BootstrapEvent, CreateSessionRequest, SessionService};
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SessionService>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (code, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id/ws", get(crate::ws::session_ws))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

fn ndjson_line(event: &BootstrapEvent) -> Bytes {
    let mut line = serde_json::to_vec(event).unwrap_or_else(|_| b"{}".to_vec());
    line.push(b'\n');
    Bytes::from(line)
}

/// POST /v1/sessions: create a session and stream bootstrap events until
/// the agent is ready.
async fn create_session(
    State(st): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Response {
    let service = st.service.clone();
    let stream = async_stream::stream! {
        yield Ok::<Bytes, Infallible>(ndjson_line(&BootstrapEvent::message("creating session")));
        match service.create_session(request).await {
            Ok(session) => {
                let agent_id = session.session_id().to_string();
                yield Ok(ndjson_line(&BootstrapEvent {
                    agent_id: Some(agent_id.clone()),
                    ..Default::default()
                }));
                yield Ok(ndjson_line(&BootstrapEvent {
                    websocket_url: Some(service.websocket_url(&agent_id)),
                    ..Default::default()
                }));
                yield Ok(ndjson_line(&BootstrapEvent::message("ready")));
            }
            Err(e) => {
                yield Ok(ndjson_line(&BootstrapEvent::message(format!(
                    "session creation failed: {e}"
                ))));
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_lines_are_newline_delimited_json() {
        let line = ndjson_line(&BootstrapEvent {
            agent_id: Some("a1".into()),
            ..Default::default()
        });
        let text = std::str::from_utf8(&line).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed["agentId"], "a1");
        assert!(parsed.get("message").is_none());
    }
}
