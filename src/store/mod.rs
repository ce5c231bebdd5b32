//! Keyed poll storage with atomic per-poll operations
//!
//! Every method is a single read-modify-write against one poll record. The
//! store is the only place the "no membership or nomination changes after
//! start" rule is enforced, so callers never pre-check and then write.

mod memory;

use async_trait::async_trait;

use crate::error::PollResult;
use crate::types::{Nomination, NominationId, ParticipantId, Poll, PollId};

pub use memory::MemoryPollStore;

#[derive(Debug, Clone)]
pub struct CreatePollFields {
    pub poll_id: PollId,
    pub topic: String,
    pub votes_per_voter: u32,
    pub admin_id: ParticipantId,
}

#[derive(Debug, Clone)]
pub struct AddParticipantFields {
    pub poll_id: PollId,
    pub participant_id: ParticipantId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AddNominationFields {
    pub poll_id: PollId,
    pub nomination_id: NominationId,
    pub nomination: Nomination,
}

#[derive(Debug, Clone)]
pub struct AddRankingsFields {
    pub poll_id: PollId,
    pub participant_id: ParticipantId,
    pub rankings: Vec<NominationId>,
}

/// Storage backend for poll records.
///
/// Unknown or expired polls fail with `Conflict::NotFound`. Membership and
/// nomination mutations on a started poll fail with `Conflict::AlreadyStarted`.
/// Removing an absent participant or nomination succeeds and returns the
/// unchanged poll.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn create_poll(&self, fields: CreatePollFields) -> PollResult<Poll>;

    async fn get_poll(&self, poll_id: &str) -> PollResult<Poll>;

    async fn delete_poll(&self, poll_id: &str) -> PollResult<()>;

    /// Adding a participant who is already present is an idempotent rejoin,
    /// accepted even after the poll has started.
    async fn add_participant(&self, fields: AddParticipantFields) -> PollResult<Poll>;

    async fn remove_participant(&self, poll_id: &str, participant_id: &str) -> PollResult<Poll>;

    async fn add_nomination(&self, fields: AddNominationFields) -> PollResult<Poll>;

    async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll>;

    /// Irreversible. Starting a started poll returns it unchanged.
    async fn start_poll(&self, poll_id: &str) -> PollResult<Poll>;

    /// Only accepted once the poll has started; overwrites earlier rankings
    /// from the same participant.
    async fn add_participant_rankings(&self, fields: AddRankingsFields) -> PollResult<Poll>;
}
