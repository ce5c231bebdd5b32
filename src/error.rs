//! Error taxonomy shared by the gateway, the store and the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::types::PollId;

/// Result type for poll operations
pub type PollResult<T> = Result<T, PollError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("No access token provided")]
    MissingCredential,

    #[error("Invalid authorization token")]
    InvalidCredential,

    #[error("Admin privileges are required to {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("Poll store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Rejected mutations that are a normal outcome, not a fault
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("Poll {0} does not exist")]
    NotFound(PollId),

    #[error("Poll {0} has already started")]
    AlreadyStarted(PollId),

    #[error("Identifier {0} is already in use")]
    DuplicateId(String),
}

impl PollError {
    /// Stable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            PollError::MissingCredential => "MISSING_CREDENTIAL",
            PollError::InvalidCredential => "INVALID_CREDENTIAL",
            PollError::Forbidden(_) => "FORBIDDEN",
            PollError::Validation(_) => "VALIDATION_FAILED",
            PollError::Conflict(_) => "STATE_CONFLICT",
            PollError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            PollError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PollError::MissingCredential | PollError::InvalidCredential => StatusCode::UNAUTHORIZED,
            PollError::Forbidden(_) => StatusCode::FORBIDDEN,
            PollError::Validation(_) => StatusCode::BAD_REQUEST,
            PollError::Conflict(Conflict::NotFound(_)) => StatusCode::NOT_FOUND,
            PollError::Conflict(_) => StatusCode::CONFLICT,
            PollError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PollError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(poll_id: &str) -> Self {
        PollError::Conflict(Conflict::NotFound(poll_id.to_string()))
    }

    pub fn already_started(poll_id: &str) -> Self {
        PollError::Conflict(Conflict::AlreadyStarted(poll_id.to_string()))
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "code": self.code(),
            "msg": self.to_string(),
        }));
        (status, body).into_response()
    }
}
