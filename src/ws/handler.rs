use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::registry::ConnectionHandle;
use crate::server::AppState;

use super::message::ClientFrame;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. A missing or bad credential never blocks the
/// upgrade; the connection simply stays unauthenticated.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let token = extract_token(&query, &headers);

    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Extract token from query parameter or Authorization header
fn extract_token(query: &WsQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(ref token) = query.token {
        return Some(token.clone());
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state, token))]
async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let connection_start = std::time::Instant::now();

    // Channel feeding this connection's send pump
    let (tx, mut rx) = mpsc::channel(state.settings.websocket.send_buffer);

    let handle = Arc::new(ConnectionHandle::new(tx));
    let connection_id = handle.id;

    if !state.connections.register(handle) {
        return;
    }

    tracing::info!(connection_id = %connection_id, "Connection established");

    // Credential supplied at connect time: authenticate before entering the
    // read loop, so a join-less client is already identity-addressable.
    // Failure is not reported to the client here.
    if let Some(token) = token {
        let _ = state
            .router
            .authenticate_connection(connection_id, &token)
            .await;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending events from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if ws_sender
                .send(Message::Text(event.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Task for receiving messages from WebSocket
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &state_clone, connection_id).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // Teardown: transport-level room membership, then the registry cascade.
    state.subscriptions.release_connection(connection_id);
    state.router.handle_disconnect(connection_id);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = connection_start.elapsed().as_secs_f64(),
        "Connection closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, state: &AppState, connection_id: Uuid) -> bool {
    match msg {
        Message::Text(text) => {
            let frame = match ClientFrame::decode(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        error = %e,
                        "Failed to parse client frame"
                    );
                    return true;
                }
            };

            handle_client_frame(frame, state, connection_id).await;
            true
        }
        Message::Binary(_) => {
            tracing::debug!(connection_id = %connection_id, "Binary frame dropped");
            true
        }
        // Axum answers pings automatically
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Received close frame");
            false
        }
    }
}

async fn handle_client_frame(frame: ClientFrame, state: &AppState, connection_id: Uuid) {
    match frame {
        ClientFrame::Subscribe { channels } => {
            for channel in channels {
                if !is_valid_channel_name(&channel) {
                    tracing::debug!(
                        connection_id = %connection_id,
                        channel = %channel,
                        "Invalid channel name ignored"
                    );
                    continue;
                }
                state.subscriptions.subscribe(connection_id, &channel);
            }
        }
        ClientFrame::Unsubscribe { channels } => {
            for channel in channels {
                state.subscriptions.unsubscribe(connection_id, &channel);
            }
        }
        ClientFrame::Event(event) => {
            state.router.dispatch(connection_id, event).await;
        }
    }
}

/// Validate channel name
fn is_valid_channel_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }

    // Only allow alphanumeric, dash, underscore, and dot
    name.chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}
