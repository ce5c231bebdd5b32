//! WebSocket message dispatch
//!
//! Every message runs against the connection's immutable context. Successful
//! mutations are broadcast to the room by the state layer, so the originator
//! learns of them through its own room subscription; only failures are
//! answered directly.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionContext;
use std::sync::Arc;

/// Turn an operation outcome into the direct reply (errors only)
macro_rules! reply {
    ($ctx:expr, $action:expr, $result:expr) => {
        match $result {
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(
                    "Rejected {} from participant {} in poll {}: {}",
                    $action,
                    $ctx.participant_id,
                    $ctx.poll_id,
                    e
                );
                Some(ServerMessage::error(&e))
            }
        }
    };
}

/// Handle a client message and return an optional direct response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &ConnectionContext,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Nominate { text } => {
            reply!(ctx, "nominate", state.nominate(ctx, &text).await)
        }

        // Admin-only commands (authorization checked against a fresh poll read)
        ClientMessage::RemoveNomination { id } => {
            reply!(
                ctx,
                "remove_nomination",
                state.remove_nomination(ctx, &id).await
            )
        }

        ClientMessage::RemoveParticipant { id } => {
            reply!(
                ctx,
                "remove_participant",
                state.kick_participant(ctx, &id).await
            )
        }

        ClientMessage::SubmitRankings { rankings } => {
            reply!(
                ctx,
                "submit_rankings",
                state.submit_rankings(ctx, rankings).await
            )
        }
    }
}
