//! HTTP API endpoints for creating, joining and starting polls.
//!
//! These run alongside the realtime channel and mutate the same store; state
//! changes made here are broadcast to the poll's room like any other.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth;
use crate::error::{PollError, PollResult};
use crate::state::{AppState, CreatePollRequest, JoinPollRequest, PollWithToken};
use crate::types::{ConnectionContext, Poll};

/// Body of guarded requests. The token may also come as a bearer header.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest {
    pub access_token: Option<String>,
}

fn request_context(
    state: &AppState,
    headers: &HeaderMap,
    body: AccessTokenRequest,
) -> PollResult<ConnectionContext> {
    let token = body.access_token.or_else(|| auth::bearer_token(headers));
    auth::authenticate(state.tokens.as_ref(), token.as_deref())
}

/// Create a poll.
///
/// POST /polls
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePollRequest>,
) -> PollResult<(StatusCode, Json<PollWithToken>)> {
    let created = state.create_poll(request).await?;
    tracing::info!(
        "Created poll {} with admin {}",
        created.poll.id,
        created.poll.admin_id
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get an access token for an existing poll.
///
/// POST /polls/join
pub async fn join_poll(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JoinPollRequest>,
) -> PollResult<Json<PollWithToken>> {
    Ok(Json(state.join_poll(request).await?))
}

/// Re-add the token holder to the poll's participants.
///
/// POST /polls/rejoin
pub async fn rejoin_poll(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AccessTokenRequest>,
) -> PollResult<Json<Poll>> {
    let ctx = request_context(&state, &headers, body)?;
    tracing::debug!(
        "Rejoining poll {} for participant {} as {:?}",
        ctx.poll_id,
        ctx.participant_id,
        ctx.display_name
    );
    Ok(Json(state.add_participant(&ctx).await?))
}

/// Start the poll. Admin only.
///
/// POST /polls/start
pub async fn start_poll(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AccessTokenRequest>,
) -> PollResult<Json<Poll>> {
    let ctx = request_context(&state, &headers, body)?;
    Ok(Json(state.start_poll(&ctx).await?))
}

/// Current snapshot of a poll. Requires a bearer token issued for it.
///
/// GET /polls/{id}
pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> PollResult<Json<Poll>> {
    let ctx = request_context(&state, &headers, AccessTokenRequest::default())?;
    if ctx.poll_id != poll_id {
        tracing::warn!(
            "Participant {} asked for poll {} with a token for {}",
            ctx.participant_id,
            poll_id,
            ctx.poll_id
        );
        return Err(PollError::Forbidden(
            "Token was not issued for this poll".to_string(),
        ));
    }
    Ok(Json(state.store.get_poll(&poll_id).await?))
}
