//! Live notification channel.
//!
//! Push-only: the server forwards new notifications as JSON text frames.
//! Anything the client sends apart from a close frame is ignored.

use super::extract::session_token;
use super::{ApiError, AppState};
use crate::auth::Operation;
use crate::notify::PushMessage;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// GET /ws?token=
///
/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also come from the query string. The caller is authenticated before the
/// handshake itself is validated.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| session_token(&headers))
        .ok_or_else(ApiError::unauthorized)?;

    let identity = state
        .sessions
        .resolve(&token)
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    identity.authorize(Operation::LiveChannel)?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let user_id = identity.user_id;
    Ok(ws
        .on_upgrade(move |socket| handle_websocket(socket, state, user_id))
        .into_response())
}

async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<PushMessage>();

    let conn_id = state.hub.register(user_id, tx);
    tracing::info!(user_id = %user_id, conn_id, "live channel opened");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "live channel error");
                break;
            }
            _ => {}
        }
    }

    state.hub.unregister(user_id, conn_id);
    send_task.abort();
    tracing::info!(user_id = %user_id, conn_id, "live channel closed");
}
