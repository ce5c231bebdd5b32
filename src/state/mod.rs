mod poll;
mod room;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::store::{MemoryPollStore, PollStore};
use crate::token::{JwtAuthenticator, TokenAuthenticator};

pub use poll::{CreatePollRequest, JoinPollRequest, PollWithToken};
pub use room::{ConnectionId, RoomRegistry};

/// Shared application state, handed to every connection and request.
///
/// The store and token primitive are injected; the room registry is the only
/// mutable state owned here.
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub tokens: Arc<dyn TokenAuthenticator>,
    pub rooms: RoomRegistry,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PollStore>,
        tokens: Arc<dyn TokenAuthenticator>,
    ) -> Self {
        Self {
            store,
            tokens,
            rooms: RoomRegistry::new(),
            config,
        }
    }

    /// In-memory store and JWT tokens built from `config`
    pub fn in_memory(config: AppConfig) -> Self {
        let store = Arc::new(MemoryPollStore::new(config.poll_duration));
        let tokens = Arc::new(JwtAuthenticator::new(&config.jwt_secret));
        Self::new(config, store, tokens)
    }

    /// Purge expired polls from `store` and close their rooms.
    /// Returns how many polls were purged.
    pub async fn sweep_expired(&self, store: &MemoryPollStore) -> usize {
        let expired = store.purge_expired().await;
        for poll_id in &expired {
            self.rooms.close(poll_id).await;
        }
        expired.len()
    }
}

/// Spawn a background task that periodically purges expired polls
pub fn spawn_expiry_sweeper(
    state: Arc<AppState>,
    store: Arc<MemoryPollStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let purged = state.sweep_expired(&store).await;
            if purged > 0 {
                tracing::info!("Purged {} expired polls", purged);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use crate::protocol::ServerMessage;
    use crate::types::ConnectionContext;

    fn state() -> AppState {
        AppState::in_memory(AppConfig::default())
    }

    async fn create(state: &AppState) -> PollWithToken {
        state
            .create_poll(CreatePollRequest {
                topic: "Lunch".to_string(),
                votes_per_voter: 2,
                name: "Alice".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_poll_issues_admin_token() {
        let state = state();
        let created = create(&state).await;

        let claims = state.tokens.verify(&created.access_token).unwrap();
        assert_eq!(claims.sub, created.poll.admin_id);
        assert_eq!(claims.poll_id, created.poll.id);
        assert_eq!(claims.name, "Alice");
        // The admin becomes a participant only when they connect
        assert!(created.poll.participants.is_empty());
    }

    #[tokio::test]
    async fn test_create_poll_validation() {
        let state = state();
        for (topic, votes, name) in [("", 1, "A"), ("T", 0, "A"), ("T", 6, "A"), ("T", 1, "")] {
            let result = state
                .create_poll(CreatePollRequest {
                    topic: topic.to_string(),
                    votes_per_voter: votes,
                    name: name.to_string(),
                })
                .await;
            assert!(matches!(result, Err(PollError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_join_poll() {
        let state = state();
        let created = create(&state).await;

        let joined = state
            .join_poll(JoinPollRequest {
                poll_id: created.poll.id.clone(),
                name: "Bob".to_string(),
            })
            .await
            .unwrap();
        let claims = state.tokens.verify(&joined.access_token).unwrap();
        assert_ne!(claims.sub, created.poll.admin_id);
        assert_eq!(claims.poll_id, created.poll.id);

        let missing = state
            .join_poll(JoinPollRequest {
                poll_id: "ZZZZZZ".to_string(),
                name: "Bob".to_string(),
            })
            .await;
        assert_eq!(missing.err(), Some(PollError::not_found("ZZZZZZ")));
    }

    #[tokio::test]
    async fn test_remove_participant_after_start_is_silent() {
        let state = state();
        let created = create(&state).await;
        let ctx = ConnectionContext {
            participant_id: created.poll.admin_id.clone(),
            poll_id: created.poll.id.clone(),
            display_name: "Alice".to_string(),
        };
        state.add_participant(&ctx).await.unwrap();
        state.start_poll(&ctx).await.unwrap();

        let result = state
            .remove_participant(&ctx.poll_id, &ctx.participant_id)
            .await
            .unwrap();
        assert!(result.is_none());
        let poll = state.store.get_poll(&ctx.poll_id).await.unwrap();
        assert!(poll.participants.contains_key(&ctx.participant_id));
    }

    #[tokio::test]
    async fn test_sweep_closes_rooms_of_expired_polls() {
        let config = AppConfig {
            poll_duration: Duration::from_millis(20),
            ..AppConfig::default()
        };
        let store = Arc::new(MemoryPollStore::new(config.poll_duration));
        let tokens = Arc::new(JwtAuthenticator::new(&config.jwt_secret));
        let state = AppState::new(config, store.clone(), tokens);

        let created = create(&state).await;
        let mut rx = state.rooms.join(&created.poll.id, "c1").await;
        assert_eq!(state.sweep_expired(&store).await, 0);
        assert_eq!(state.rooms.room_size(&created.poll.id).await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(state.sweep_expired(&store).await, 1);
        assert_eq!(store.len().await, 0);
        assert_eq!(state.rooms.room_size(&created.poll.id).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_start_poll_requires_admin_and_broadcasts() {
        let state = state();
        let created = create(&state).await;
        let admin = ConnectionContext {
            participant_id: created.poll.admin_id.clone(),
            poll_id: created.poll.id.clone(),
            display_name: "Alice".to_string(),
        };
        let other = ConnectionContext {
            participant_id: "someone-else".to_string(),
            ..admin.clone()
        };
        let mut rx = state.rooms.join(&admin.poll_id, "c1").await;

        assert!(matches!(
            state.start_poll(&other).await,
            Err(PollError::Forbidden(_))
        ));
        assert!(rx.try_recv().is_err());

        let poll = state.start_poll(&admin).await.unwrap();
        assert!(poll.has_started);
        match rx.try_recv() {
            Ok(ServerMessage::PollUpdated { poll }) => assert!(poll.has_started),
            other => panic!("Expected PollUpdated, got {:?}", other),
        }
    }
}
