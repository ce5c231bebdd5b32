pub mod handlers;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::auth;
use crate::error::PollResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionContext;

/// Close code for a connection whose poll cannot be joined
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The access token is checked before the upgrade; a rejected attempt gets a
/// plain HTTP error and never completes the handshake.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let token = params.access_token.or_else(|| auth::bearer_token(&headers));

    let ctx = match auth::authenticate(state.tokens.as_ref(), token.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!("WebSocket connection refused: {}", e);
            return e.into_response();
        }
    };

    tracing::info!(
        "WebSocket connection request: participant={}, poll={}, name={:?}",
        ctx.participant_id,
        ctx.poll_id,
        ctx.display_name
    );

    ws.on_upgrade(move |socket| handle_socket(socket, ctx, state))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Admit an authenticated connection: join the poll's room, then add the
/// participant. The room (this connection included) receives the resulting
/// snapshot. On failure the connection is taken back out of the room.
pub async fn admit(
    state: &Arc<AppState>,
    ctx: &ConnectionContext,
    connection_id: &str,
) -> PollResult<mpsc::Receiver<ServerMessage>> {
    let room_rx = state.rooms.join(&ctx.poll_id, connection_id).await;

    if let Err(e) = state.add_participant(ctx).await {
        tracing::warn!(
            "Admission of participant {} to poll {} failed: {}",
            ctx.participant_id,
            ctx.poll_id,
            e
        );
        state.rooms.leave(&ctx.poll_id, connection_id).await;
        return Err(e);
    }

    Ok(room_rx)
}

/// Handle an authenticated WebSocket connection
async fn handle_socket(socket: WebSocket, ctx: ConnectionContext, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = ulid::Ulid::new().to_string();

    let mut room_rx = match admit(&state, &ctx, &connection_id).await {
        Ok(rx) => rx,
        Err(e) => {
            send_json(&mut sender, &ServerMessage::error(&e)).await;
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: e.code().to_string().into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(
        "Participant {} joined poll {} ({} connections in room)",
        ctx.participant_id,
        ctx.poll_id,
        state.rooms.room_size(&ctx.poll_id).await
    );

    loop {
        tokio::select! {
            room_msg = room_rx.recv() => {
                match room_msg {
                    Some(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", ctx.participant_id, text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &ctx, &state).await,
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by participant {}", ctx.participant_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    disconnect(&state, &ctx, &connection_id).await;
}

/// Leave the room, then drop the participant from the poll unless it has
/// started. The remaining members get the new snapshot.
pub async fn disconnect(state: &Arc<AppState>, ctx: &ConnectionContext, connection_id: &str) {
    let remaining = state.rooms.leave(&ctx.poll_id, connection_id).await;

    match state
        .remove_participant(&ctx.poll_id, &ctx.participant_id)
        .await
    {
        Ok(Some(_)) => tracing::debug!(
            "Removed participant {} from poll {}",
            ctx.participant_id,
            ctx.poll_id
        ),
        Ok(None) => tracing::debug!(
            "Poll {} has started, keeping participant {}",
            ctx.poll_id,
            ctx.participant_id
        ),
        Err(e) => tracing::warn!(
            "Could not remove participant {} from poll {}: {}",
            ctx.participant_id,
            ctx.poll_id,
            e
        ),
    }

    tracing::info!(
        "WebSocket connection closed for participant {} ({} connections left in room {})",
        ctx.participant_id,
        remaining,
        ctx.poll_id
    );
}
