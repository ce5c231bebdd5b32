use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{
    AddNominationFields, AddParticipantFields, AddRankingsFields, CreatePollFields, PollStore,
};
use crate::error::{Conflict, PollError, PollResult};
use crate::types::{NominationId, Poll, PollId};

struct Entry {
    poll: Poll,
    expires_at: Instant,
    /// Every nomination ID ever accepted, so removed IDs are never reused
    issued_nominations: HashSet<NominationId>,
}

/// In-process poll store. A single write lock is held for the duration of
/// each read-modify-write, which serializes mutations per poll (and across
/// polls, which is stricter than required).
pub struct MemoryPollStore {
    polls: RwLock<HashMap<PollId, Entry>>,
    ttl: Duration,
}

impl MemoryPollStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            polls: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Apply `mutate` atomically to a live poll. The closure returns whether
    /// it changed anything; it must check its guards before touching state.
    async fn update<F>(&self, poll_id: &str, mutate: F) -> PollResult<Poll>
    where
        F: FnOnce(&mut Entry) -> PollResult<bool>,
    {
        let mut polls = self.polls.write().await;

        let expired = match polls.get(poll_id) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return Err(PollError::not_found(poll_id)),
        };
        if expired {
            polls.remove(poll_id);
            tracing::debug!("Poll {} expired", poll_id);
            return Err(PollError::not_found(poll_id));
        }

        let entry = polls
            .get_mut(poll_id)
            .ok_or_else(|| PollError::not_found(poll_id))?;
        if mutate(entry)? {
            entry.poll.version += 1;
        }
        Ok(entry.poll.clone())
    }

    /// Drop every expired poll, returning the IDs that were removed
    pub async fn purge_expired(&self) -> Vec<PollId> {
        let now = Instant::now();
        let mut polls = self.polls.write().await;
        let expired: Vec<PollId> = polls
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for poll_id in &expired {
            polls.remove(poll_id);
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }
}

fn ensure_not_started(poll: &Poll) -> PollResult<()> {
    if poll.has_started {
        return Err(PollError::already_started(&poll.id));
    }
    Ok(())
}

fn validate_rankings(poll: &Poll, rankings: &[NominationId]) -> PollResult<()> {
    if rankings.is_empty() {
        return Err(PollError::Validation(
            "Rankings must contain at least one nomination".to_string(),
        ));
    }
    if rankings.len() > poll.votes_per_voter as usize {
        return Err(PollError::Validation(format!(
            "At most {} nominations may be ranked",
            poll.votes_per_voter
        )));
    }
    let mut seen = HashSet::new();
    for id in rankings {
        if !poll.nominations.contains_key(id) {
            return Err(PollError::Validation(format!("Unknown nomination {}", id)));
        }
        if !seen.insert(id) {
            return Err(PollError::Validation(format!(
                "Nomination {} is ranked more than once",
                id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn create_poll(&self, fields: CreatePollFields) -> PollResult<Poll> {
        let mut polls = self.polls.write().await;
        let now = Instant::now();

        if let Some(existing) = polls.get(&fields.poll_id) {
            if existing.expires_at > now {
                return Err(Conflict::DuplicateId(fields.poll_id).into());
            }
        }

        let poll = Poll::new(
            fields.poll_id,
            fields.topic,
            fields.votes_per_voter,
            fields.admin_id,
        );
        tracing::info!("Creating poll {} (ttl {:?})", poll.id, self.ttl);
        polls.insert(
            poll.id.clone(),
            Entry {
                poll: poll.clone(),
                expires_at: now + self.ttl,
                issued_nominations: HashSet::new(),
            },
        );
        Ok(poll)
    }

    async fn get_poll(&self, poll_id: &str) -> PollResult<Poll> {
        let polls = self.polls.read().await;
        match polls.get(poll_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.poll.clone()),
            _ => Err(PollError::not_found(poll_id)),
        }
    }

    async fn delete_poll(&self, poll_id: &str) -> PollResult<()> {
        match self.polls.write().await.remove(poll_id) {
            Some(_) => {
                tracing::info!("Deleted poll {}", poll_id);
                Ok(())
            }
            None => Err(PollError::not_found(poll_id)),
        }
    }

    async fn add_participant(&self, fields: AddParticipantFields) -> PollResult<Poll> {
        self.update(&fields.poll_id, |entry| {
            let poll = &mut entry.poll;
            if poll.participants.get(&fields.participant_id) == Some(&fields.name) {
                return Ok(false);
            }
            ensure_not_started(poll)?;
            poll.participants
                .insert(fields.participant_id.clone(), fields.name.clone());
            Ok(true)
        })
        .await
    }

    async fn remove_participant(&self, poll_id: &str, participant_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |entry| {
            ensure_not_started(&entry.poll)?;
            Ok(entry.poll.participants.remove(participant_id).is_some())
        })
        .await
    }

    async fn add_nomination(&self, fields: AddNominationFields) -> PollResult<Poll> {
        self.update(&fields.poll_id, |entry| {
            ensure_not_started(&entry.poll)?;
            if entry.issued_nominations.contains(&fields.nomination_id) {
                return Err(Conflict::DuplicateId(fields.nomination_id.clone()).into());
            }
            entry.issued_nominations.insert(fields.nomination_id.clone());
            entry
                .poll
                .nominations
                .insert(fields.nomination_id.clone(), fields.nomination.clone());
            Ok(true)
        })
        .await
    }

    async fn remove_nomination(&self, poll_id: &str, nomination_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |entry| {
            ensure_not_started(&entry.poll)?;
            Ok(entry.poll.nominations.remove(nomination_id).is_some())
        })
        .await
    }

    async fn start_poll(&self, poll_id: &str) -> PollResult<Poll> {
        self.update(poll_id, |entry| {
            if entry.poll.has_started {
                return Ok(false);
            }
            entry.poll.has_started = true;
            Ok(true)
        })
        .await
    }

    async fn add_participant_rankings(&self, fields: AddRankingsFields) -> PollResult<Poll> {
        self.update(&fields.poll_id, |entry| {
            let poll = &mut entry.poll;
            if !poll.has_started {
                return Err(PollError::Validation(
                    "Participants cannot rank until the poll has started".to_string(),
                ));
            }
            validate_rankings(poll, &fields.rankings)?;
            poll.rankings
                .insert(fields.participant_id.clone(), fields.rankings.clone());
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Nomination;
    use std::sync::Arc;

    const POLL: &str = "ABC123";

    async fn store_with_poll() -> MemoryPollStore {
        let store = MemoryPollStore::new(Duration::from_secs(60));
        store
            .create_poll(CreatePollFields {
                poll_id: POLL.to_string(),
                topic: "Lunch".to_string(),
                votes_per_voter: 2,
                admin_id: "admin".to_string(),
            })
            .await
            .unwrap();
        store
    }

    fn participant(id: &str, name: &str) -> AddParticipantFields {
        AddParticipantFields {
            poll_id: POLL.to_string(),
            participant_id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn nomination(id: &str, by: &str, text: &str) -> AddNominationFields {
        AddNominationFields {
            poll_id: POLL.to_string(),
            nomination_id: id.to_string(),
            nomination: Nomination {
                submitted_by: by.to_string(),
                text: text.to_string(),
            },
        }
    }

    fn rankings(by: &str, ids: &[&str]) -> AddRankingsFields {
        AddRankingsFields {
            poll_id: POLL.to_string(),
            participant_id: by.to_string(),
            rankings: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store_with_poll().await;
        let poll = store.get_poll(POLL).await.unwrap();
        assert_eq!(poll.topic, "Lunch");
        assert_eq!(poll.admin_id, "admin");
        assert!(poll.participants.is_empty());
        assert!(!poll.has_started);
    }

    #[tokio::test]
    async fn test_duplicate_poll_id_rejected() {
        let store = store_with_poll().await;
        let result = store
            .create_poll(CreatePollFields {
                poll_id: POLL.to_string(),
                topic: "Other".to_string(),
                votes_per_voter: 1,
                admin_id: "x".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(PollError::Conflict(Conflict::DuplicateId(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_poll() {
        let store = MemoryPollStore::new(Duration::from_secs(60));
        assert_eq!(
            store.get_poll("NOPE").await,
            Err(PollError::not_found("NOPE"))
        );
        assert_eq!(
            store.add_participant(participant("a", "A")).await,
            Err(PollError::not_found(POLL))
        );
    }

    #[tokio::test]
    async fn test_participant_add_remove() {
        let store = store_with_poll().await;
        let poll = store.add_participant(participant("b", "Bob")).await.unwrap();
        assert_eq!(poll.participants.get("b"), Some(&"Bob".to_string()));

        let poll = store.remove_participant(POLL, "b").await.unwrap();
        assert!(poll.participants.is_empty());

        // Removing again is a no-op without a version bump
        let again = store.remove_participant(POLL, "b").await.unwrap();
        assert_eq!(again.version, poll.version);
    }

    #[tokio::test]
    async fn test_started_poll_rejects_membership_and_nominations() {
        let store = store_with_poll().await;
        store.add_participant(participant("a", "Ann")).await.unwrap();
        store
            .add_nomination(nomination("n1", "a", "Pizza"))
            .await
            .unwrap();
        let started = store.start_poll(POLL).await.unwrap();
        assert!(started.has_started);

        let conflict = Err(PollError::already_started(POLL));
        assert_eq!(store.add_participant(participant("c", "Cid")).await, conflict);
        assert_eq!(store.remove_participant(POLL, "a").await, conflict);
        assert_eq!(
            store.add_nomination(nomination("n2", "a", "Tacos")).await,
            conflict
        );
        assert_eq!(store.remove_nomination(POLL, "n1").await, conflict);

        // Rejoin of a present participant is tolerated
        let poll = store.add_participant(participant("a", "Ann")).await.unwrap();
        assert_eq!(poll.version, started.version);

        let poll = store
            .add_participant_rankings(rankings("a", &["n1"]))
            .await
            .unwrap();
        assert_eq!(poll.rankings.get("a"), Some(&vec!["n1".to_string()]));
    }

    #[tokio::test]
    async fn test_start_is_monotonic() {
        let store = store_with_poll().await;
        let first = store.start_poll(POLL).await.unwrap();
        let second = store.start_poll(POLL).await.unwrap();
        assert!(second.has_started);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn test_rankings_require_start() {
        let store = store_with_poll().await;
        store
            .add_nomination(nomination("n1", "a", "Pizza"))
            .await
            .unwrap();
        let result = store.add_participant_rankings(rankings("a", &["n1"])).await;
        assert!(matches!(result, Err(PollError::Validation(_))));
        assert!(store.get_poll(POLL).await.unwrap().rankings.is_empty());
    }

    #[tokio::test]
    async fn test_rankings_validation_and_overwrite() {
        let store = store_with_poll().await;
        for (id, text) in [("n1", "Pizza"), ("n2", "Tacos"), ("n3", "Sushi")] {
            store.add_nomination(nomination(id, "a", text)).await.unwrap();
        }
        store.start_poll(POLL).await.unwrap();

        for bad in [
            vec![],
            vec!["n1", "n2", "n3"],
            vec!["n1", "n1"],
            vec!["missing"],
        ] {
            let result = store.add_participant_rankings(rankings("a", &bad)).await;
            assert!(matches!(result, Err(PollError::Validation(_))), "{:?}", bad);
        }

        store
            .add_participant_rankings(rankings("a", &["n1", "n2"]))
            .await
            .unwrap();
        let poll = store
            .add_participant_rankings(rankings("a", &["n3"]))
            .await
            .unwrap();
        assert_eq!(poll.rankings.get("a"), Some(&vec!["n3".to_string()]));
    }

    #[tokio::test]
    async fn test_nomination_ids_never_reused() {
        let store = store_with_poll().await;
        store
            .add_nomination(nomination("n1", "a", "Pizza"))
            .await
            .unwrap();
        store.remove_nomination(POLL, "n1").await.unwrap();

        let result = store.add_nomination(nomination("n1", "b", "Tacos")).await;
        assert!(matches!(
            result,
            Err(PollError::Conflict(Conflict::DuplicateId(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_nominations_are_not_lost() {
        let store = Arc::new(store_with_poll().await);
        let mut tasks = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .add_nomination(nomination(&format!("n{}", i), "a", "idea"))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let poll = store.get_poll(POLL).await.unwrap();
        assert_eq!(poll.nominations.len(), 50);
        assert_eq!(poll.version, 51);
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = MemoryPollStore::new(Duration::from_millis(20));
        store
            .create_poll(CreatePollFields {
                poll_id: POLL.to_string(),
                topic: "Lunch".to_string(),
                votes_per_voter: 1,
                admin_id: "admin".to_string(),
            })
            .await
            .unwrap();
        assert!(store.get_poll(POLL).await.is_ok());

        assert_eq!(store.len().await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get_poll(POLL).await, Err(PollError::not_found(POLL)));
        assert_eq!(store.purge_expired().await, vec![POLL.to_string()]);
        assert!(store.is_empty().await);
        assert!(store.purge_expired().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_poll() {
        let store = store_with_poll().await;
        store.delete_poll(POLL).await.unwrap();
        assert!(store.get_poll(POLL).await.is_err());
        assert!(store.delete_poll(POLL).await.is_err());
    }
}
