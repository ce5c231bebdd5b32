//! Room membership: which live connections receive broadcasts for a poll

use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

use crate::protocol::ServerMessage;
use crate::types::{Poll, PollId};

pub type ConnectionId = String;

/// Snapshots a connection may have queued before it is dropped from its room
pub const OUTBOX_CAPACITY: usize = 32;

struct Room {
    members: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    /// Version of the newest snapshot delivered to this room
    last_version: u64,
}

/// Maps each poll to the connections currently admitted to it.
///
/// The lock is only held for in-memory bookkeeping, never across a store call.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<PollId, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room and return the receiving end of its outbox
    pub async fn join(
        &self,
        poll_id: &str,
        connection_id: &str,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(poll_id.to_string()).or_insert_with(|| Room {
            members: HashMap::new(),
            last_version: 0,
        });
        room.members.insert(connection_id.to_string(), tx);
        tracing::debug!(
            "Connection {} joined room {} ({} members)",
            connection_id,
            poll_id,
            room.members.len()
        );
        rx
    }

    /// Remove a connection, dropping the room once it is empty.
    /// Returns the number of members left.
    pub async fn leave(&self, poll_id: &str, connection_id: &str) -> usize {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(poll_id) else {
            return 0;
        };
        room.members.remove(connection_id);
        let remaining = room.members.len();
        if remaining == 0 {
            rooms.remove(poll_id);
        }
        tracing::debug!(
            "Connection {} left room {} ({} members)",
            connection_id,
            poll_id,
            remaining
        );
        remaining
    }

    /// Send a poll snapshot to every member of its room.
    ///
    /// Snapshots older than one already delivered to the room are dropped, so
    /// members never move backwards when two mutations publish out of order.
    /// A member whose outbox is full is removed; its receiver then ends and
    /// the socket closes. Returns how many members the snapshot was delivered to.
    pub async fn publish_poll(&self, poll: &Poll) -> usize {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&poll.id) else {
            return 0;
        };

        if poll.version < room.last_version {
            tracing::debug!(
                "Skipping stale snapshot v{} for room {} (at v{})",
                poll.version,
                poll.id,
                room.last_version
            );
            return 0;
        }
        room.last_version = poll.version;

        let msg = ServerMessage::PollUpdated { poll: poll.clone() };
        room.members
            .retain(|connection_id, tx| match tx.try_send(msg.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Dropping connection {} from room {}: outbox full",
                        connection_id,
                        poll.id
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
        room.members.len()
    }

    /// Drop a room and all of its members. Their receivers end, which closes
    /// the sockets. Returns how many members were dropped.
    pub async fn close(&self, poll_id: &str) -> usize {
        match self.rooms.write().await.remove(poll_id) {
            Some(room) => {
                tracing::info!(
                    "Closed room {} ({} members)",
                    poll_id,
                    room.members.len()
                );
                room.members.len()
            }
            None => 0,
        }
    }

    pub async fn room_size(&self, poll_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(poll_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }

    pub async fn connection_count(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .map(|room| room.members.len())
            .sum()
    }
}
