//! In-memory message store
//!
//! Ids come from a single process-wide sequence shared by all rooms, so they
//! are monotonic across the whole store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Message, MessageId, MessageStore, NewMessage, RoomId};
use crate::error::StoreError;

/// Message store backed by a map of per-room vectors
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rooms: RwLock<HashMap<RoomId, Vec<Message>>>,
    sequence: AtomicU64,
}

impl InMemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages
    pub async fn len(&self) -> usize {
        self.rooms.read().await.values().map(Vec::len).sum()
    }

    /// Whether the store holds no messages
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(&self, message: &NewMessage) -> Result<MessageId, StoreError> {
        let mut rooms = self.rooms.write().await;
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        rooms
            .entry(message.room_id)
            .or_default()
            .push(message.clone().into_message(id));

        Ok(id)
    }

    async fn find_all_by_room(&self, room_id: RoomId) -> Result<Vec<Message>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&room_id).cloned().unwrap_or_default())
    }

    async fn find_latest_by_room(&self, room_id: RoomId) -> Result<Option<Message>, StoreError> {
        let rooms = self.rooms.read().await;

        // Latest by creation time; the id breaks ties between equal timestamps
        Ok(rooms.get(&room_id).and_then(|messages| {
            messages
                .iter()
                .max_by_key(|m| (m.created_at, m.id))
                .cloned()
        }))
    }

    async fn delete_all_by_room(&self, room_id: RoomId) -> Result<(), StoreError> {
        self.rooms.write().await.remove(&room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn test_save_assigns_monotonic_ids_across_rooms() {
        let store = InMemoryMessageStore::new();

        let a = store.save(&NewMessage::new(RoomId(1), "u1", "a")).await.unwrap();
        let b = store.save(&NewMessage::new(RoomId(2), "u1", "b")).await.unwrap();
        let c = store.save(&NewMessage::new(RoomId(1), "u2", "c")).await.unwrap();

        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_find_all_by_room() {
        let store = InMemoryMessageStore::new();
        store.save(&NewMessage::new(RoomId(1), "u1", "first")).await.unwrap();
        store.save(&NewMessage::new(RoomId(2), "u1", "elsewhere")).await.unwrap();
        store.save(&NewMessage::new(RoomId(1), "u2", "second")).await.unwrap();

        let messages = store.find_all_by_room(RoomId(1)).await.unwrap();
        let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);

        assert!(store.find_all_by_room(RoomId(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_latest_uses_creation_time() {
        let store = InMemoryMessageStore::new();
        let now = Utc::now();

        store
            .save(&NewMessage::new(RoomId(1), "u1", "newer").at(now))
            .await
            .unwrap();
        store
            .save(&NewMessage::new(RoomId(1), "u1", "older").at(now - Duration::seconds(30)))
            .await
            .unwrap();

        let latest = store.find_latest_by_room(RoomId(1)).await.unwrap().unwrap();
        assert_eq!(latest.body, "newer");
        assert_eq!(latest.id, 1);

        assert!(store.find_latest_by_room(RoomId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_by_room() {
        let store = InMemoryMessageStore::new();
        store.save(&NewMessage::new(RoomId(1), "u1", "a")).await.unwrap();
        store.save(&NewMessage::new(RoomId(2), "u1", "b")).await.unwrap();

        store.delete_all_by_room(RoomId(1)).await.unwrap();

        assert!(store.find_all_by_room(RoomId(1)).await.unwrap().is_empty());
        assert_eq!(store.len().await, 1);

        // Deleting an unknown room is not an error
        store.delete_all_by_room(RoomId(42)).await.unwrap();
    }
}
