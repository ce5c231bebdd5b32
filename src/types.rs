use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PollId = String;
pub type ParticipantId = String;
pub type NominationId = String;

/// participantID -> display name
pub type Participants = HashMap<ParticipantId, String>;
pub type Nominations = HashMap<NominationId, Nomination>;
/// participantID -> ranked nomination IDs, best first
pub type Rankings = HashMap<ParticipantId, Vec<NominationId>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Nomination {
    pub submitted_by: ParticipantId,
    pub text: String,
}

/// The single shared record of a poll session.
///
/// Serialized with the field names clients expect (`votesPerVoter`, `adminID`,
/// `hasStarted`); the whole struct is the payload of `poll_updated`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub topic: String,
    pub votes_per_voter: u32,
    #[serde(rename = "adminID")]
    pub admin_id: ParticipantId,
    pub participants: Participants,
    pub nominations: Nominations,
    pub rankings: Rankings,
    pub has_started: bool,
    pub results: Vec<NominationId>,
    /// Bumped by the store on every committed mutation
    pub version: u64,
}

impl Poll {
    pub fn new(id: PollId, topic: String, votes_per_voter: u32, admin_id: ParticipantId) -> Self {
        Self {
            id,
            topic,
            votes_per_voter,
            admin_id,
            participants: HashMap::new(),
            nominations: HashMap::new(),
            rankings: HashMap::new(),
            has_started: false,
            results: Vec::new(),
            version: 1,
        }
    }

    pub fn is_admin(&self, participant_id: &str) -> bool {
        self.admin_id == participant_id
    }
}

/// Identity attached to a live connection at admission. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub participant_id: ParticipantId,
    pub poll_id: PollId,
    pub display_name: String,
}
