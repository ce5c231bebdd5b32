use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth;
use crate::error::{Conflict, PollError, PollResult};
use crate::ids;
use crate::store::{
    AddNominationFields, AddParticipantFields, AddRankingsFields, CreatePollFields,
};
use crate::token::TokenClaims;
use crate::types::*;

const MAX_TOPIC_LENGTH: usize = 100;
const MAX_NAME_LENGTH: usize = 25;
const MAX_VOTES_PER_VOTER: u32 = 5;
/// Attempts at finding an unused poll code before giving up
const POLL_ID_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub topic: String,
    pub votes_per_voter: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPollRequest {
    #[serde(rename = "pollID")]
    pub poll_id: PollId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollWithToken {
    pub poll: Poll,
    pub access_token: String,
}

fn bounded(field: &str, value: &str, max: usize) -> PollResult<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max {
        return Err(PollError::Validation(format!(
            "{} must be between 1 and {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

impl AppState {
    fn sign_token(&self, participant_id: &str, poll_id: &str, name: &str) -> PollResult<String> {
        tracing::debug!(
            "Creating token for poll {} and participant {}",
            poll_id,
            participant_id
        );
        let claims = TokenClaims::new(
            participant_id.to_string(),
            poll_id.to_string(),
            name.to_string(),
            self.config.poll_duration,
        );
        self.tokens.sign(&claims).map_err(|e| {
            tracing::error!("Token signing failed: {}", e);
            PollError::Internal(e.to_string())
        })
    }

    /// Create a poll owned by a fresh admin identity
    pub async fn create_poll(&self, request: CreatePollRequest) -> PollResult<PollWithToken> {
        let topic = bounded("Topic", &request.topic, MAX_TOPIC_LENGTH)?;
        let name = bounded("Name", &request.name, MAX_NAME_LENGTH)?;
        if !(1..=MAX_VOTES_PER_VOTER).contains(&request.votes_per_voter) {
            return Err(PollError::Validation(format!(
                "Votes per voter must be between 1 and {}",
                MAX_VOTES_PER_VOTER
            )));
        }

        let admin_id = ids::create_participant_id();
        let mut attempt = 0;
        let poll = loop {
            attempt += 1;
            let fields = CreatePollFields {
                poll_id: ids::create_poll_id(),
                topic: topic.clone(),
                votes_per_voter: request.votes_per_voter,
                admin_id: admin_id.clone(),
            };
            match self.store.create_poll(fields).await {
                Ok(poll) => break poll,
                Err(PollError::Conflict(Conflict::DuplicateId(id))) if attempt < POLL_ID_ATTEMPTS => {
                    tracing::debug!("Poll code {} already taken, retrying", id);
                }
                Err(e) => return Err(e),
            }
        };

        // Connections left over from an expired poll with the same code
        self.rooms.close(&poll.id).await;

        let access_token = self.sign_token(&admin_id, &poll.id, &name)?;
        Ok(PollWithToken { poll, access_token })
    }

    /// Mint an identity for an existing poll. Membership starts at admission.
    pub async fn join_poll(&self, request: JoinPollRequest) -> PollResult<PollWithToken> {
        let name = bounded("Name", &request.name, MAX_NAME_LENGTH)?;
        if request.poll_id.chars().count() != ids::POLL_ID_LENGTH {
            return Err(PollError::Validation(format!(
                "Poll ID must be {} characters",
                ids::POLL_ID_LENGTH
            )));
        }

        let participant_id = ids::create_participant_id();
        tracing::debug!(
            "Fetching poll {} for participant {}",
            request.poll_id,
            participant_id
        );
        let poll = self.store.get_poll(&request.poll_id).await?;
        let access_token = self.sign_token(&participant_id, &poll.id, &name)?;
        Ok(PollWithToken { poll, access_token })
    }

    /// Add the connection's participant to the poll and tell the room
    pub async fn add_participant(&self, ctx: &ConnectionContext) -> PollResult<Poll> {
        let poll = self
            .store
            .add_participant(AddParticipantFields {
                poll_id: ctx.poll_id.clone(),
                participant_id: ctx.participant_id.clone(),
                name: ctx.display_name.clone(),
            })
            .await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }

    /// Remove a participant on disconnect.
    ///
    /// Returns `None` when the poll has already started: membership is frozen
    /// and nothing is broadcast.
    pub async fn remove_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> PollResult<Option<Poll>> {
        match self.store.remove_participant(poll_id, participant_id).await {
            Ok(poll) => {
                self.rooms.publish_poll(&poll).await;
                Ok(Some(poll))
            }
            Err(PollError::Conflict(Conflict::AlreadyStarted(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fresh read of the poll, gated on the caller being its admin
    async fn admin_poll(&self, ctx: &ConnectionContext, action: &str) -> PollResult<Poll> {
        let poll = self.store.get_poll(&ctx.poll_id).await?;
        auth::authorize_admin(ctx, &poll, action)?;
        Ok(poll)
    }

    /// Admin removal of another participant. Their connection stays open.
    pub async fn kick_participant(
        &self,
        ctx: &ConnectionContext,
        participant_id: &str,
    ) -> PollResult<Poll> {
        self.admin_poll(ctx, "remove participants").await?;
        tracing::info!(
            "Admin {} removing participant {} from poll {}",
            ctx.participant_id,
            participant_id,
            ctx.poll_id
        );
        let poll = self
            .store
            .remove_participant(&ctx.poll_id, participant_id)
            .await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }

    pub async fn nominate(&self, ctx: &ConnectionContext, text: &str) -> PollResult<Poll> {
        let text = auth::validate_nomination(text, self.config.max_nomination_length)?;
        tracing::debug!(
            "Adding nomination for participant {} to poll {}: {}",
            ctx.participant_id,
            ctx.poll_id,
            text
        );
        let poll = self
            .store
            .add_nomination(AddNominationFields {
                poll_id: ctx.poll_id.clone(),
                nomination_id: ids::create_nomination_id(),
                nomination: Nomination {
                    submitted_by: ctx.participant_id.clone(),
                    text,
                },
            })
            .await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }

    /// Admin removal of a nomination. The room is sent the resulting
    /// snapshot even when the nomination was already gone.
    pub async fn remove_nomination(
        &self,
        ctx: &ConnectionContext,
        nomination_id: &str,
    ) -> PollResult<Poll> {
        self.admin_poll(ctx, "remove nominations").await?;
        tracing::debug!(
            "Removing nomination {} from poll {}",
            nomination_id,
            ctx.poll_id
        );
        let poll = self
            .store
            .remove_nomination(&ctx.poll_id, nomination_id)
            .await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }

    pub async fn start_poll(&self, ctx: &ConnectionContext) -> PollResult<Poll> {
        self.admin_poll(ctx, "start the poll").await?;
        tracing::info!("Starting poll {}", ctx.poll_id);
        let poll = self.store.start_poll(&ctx.poll_id).await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }

    /// Record (or replace) the caller's rankings
    pub async fn submit_rankings(
        &self,
        ctx: &ConnectionContext,
        rankings: Vec<NominationId>,
    ) -> PollResult<Poll> {
        tracing::debug!(
            "Submitting {} rankings for participant {} in poll {}",
            rankings.len(),
            ctx.participant_id,
            ctx.poll_id
        );
        let poll = self
            .store
            .add_participant_rankings(AddRankingsFields {
                poll_id: ctx.poll_id.clone(),
                participant_id: ctx.participant_id.clone(),
                rankings,
            })
            .await?;
        self.rooms.publish_poll(&poll).await;
        Ok(poll)
    }
}
