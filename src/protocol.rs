use crate::error::PollError;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages sent by an admitted client over the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Nominate {
        text: String,
    },
    /// Admin only
    RemoveNomination {
        id: NominationId,
    },
    /// Admin only
    RemoveParticipant {
        id: ParticipantId,
    },
    /// Accepted once the poll has started
    SubmitRankings {
        rankings: Vec<NominationId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot, sent to every room member after each committed change
    PollUpdated {
        poll: Poll,
    },
    /// Sent to the originating connection only
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(err: &PollError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}
