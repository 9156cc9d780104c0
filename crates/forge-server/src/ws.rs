//! The bidirectional session channel.
//!
//! One WebSocket per client: outbound frames are the session's event
//! stream (FIFO per channel); inbound frames go through the control
//! handler, which answers bad frames with per-channel errors.

use crate::http::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use forge_session::SessionAgent;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

pub async fn session_ws(
    State(st): State<AppState>,
    Path(id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let Some(session) = st.service.get(&id).await else {
        return crate::http::ApiError::SessionNotFound(id).into_response();
    };
    upgrade.on_upgrade(move |socket| handle_socket(session, socket))
}

async fn handle_socket(session: Arc<SessionAgent>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (channel_id, mut events) = session.events().attach();
    debug!(session_id = session.session_id(), channel_id, "channel attached");

    let forward = tokio::spawn(async move {
        while let Some(frame) = events.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(raw)) => {
                forge_session::handle_frame(&session, channel_id, &raw).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Closing a subscriber never mutates session state; just detach.
    session.events().detach(channel_id);
    forward.abort();
    debug!(session_id = session.session_id(), channel_id, "channel detached");
}
