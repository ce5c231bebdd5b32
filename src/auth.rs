//! Admission and authorization checks
//!
//! These run before any handler body: `authenticate` on every connection
//! attempt (and on guarded HTTP requests), `authorize_admin` before
//! privileged realtime messages, `validate_nomination` on nomination text.
//! Each returns a `PollResult` that the caller turns into a rejection.

use axum::http::{header, HeaderMap};

use crate::error::{PollError, PollResult};
use crate::token::TokenAuthenticator;
use crate::types::{ConnectionContext, Poll};

/// Pull a bearer token out of the Authorization header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

/// Verify an access token and derive the connection's identity.
///
/// Any verification failure is reported as `InvalidCredential`; the reason is
/// only logged.
pub fn authenticate(
    tokens: &dyn TokenAuthenticator,
    access_token: Option<&str>,
) -> PollResult<ConnectionContext> {
    let token = match access_token.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            tracing::debug!("Rejecting connection without access token");
            return Err(PollError::MissingCredential);
        }
    };

    match tokens.verify(token) {
        Ok(claims) => {
            tracing::debug!(
                "Authenticated participant {} for poll {} as {:?}",
                claims.sub,
                claims.poll_id,
                claims.name
            );
            Ok(ConnectionContext {
                participant_id: claims.sub,
                poll_id: claims.poll_id,
                display_name: claims.name,
            })
        }
        Err(e) => {
            tracing::warn!("Rejecting access token: {}", e);
            Err(PollError::InvalidCredential)
        }
    }
}

/// Allow the action only if the caller is the poll's admin.
///
/// `poll` must be freshly read from the store by the caller.
pub fn authorize_admin(context: &ConnectionContext, poll: &Poll, action: &str) -> PollResult<()> {
    if poll.is_admin(&context.participant_id) {
        Ok(())
    } else {
        tracing::warn!(
            "Participant {} attempted to {} in poll {} without admin rights",
            context.participant_id,
            action,
            poll.id
        );
        Err(PollError::Forbidden(action.to_string()))
    }
}

/// Trim and bound nomination text
pub fn validate_nomination(text: &str, max_len: usize) -> PollResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PollError::Validation(
            "Nomination text cannot be empty".to_string(),
        ));
    }
    if text.chars().count() > max_len {
        return Err(PollError::Validation(format!(
            "Nomination text cannot exceed {} characters",
            max_len
        )));
    }
    Ok(text.to_string())
}
