//! Message data model and the durable store interface
//!
//! The store is an external collaborator: it owns the durable copy of every
//! message and assigns identifiers. The fan-out core only consumes it through
//! [`MessageStore`]. [`InMemoryMessageStore`] is the reference backend used by
//! the binary and the tests.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use memory::InMemoryMessageStore;

/// Identifier of a chat room
///
/// Zero is reserved and never names a real room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl RoomId {
    /// Create a room id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this id names no room
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RoomId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Store-assigned message identifier
pub type MessageId = u64;

/// A message that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Room the message belongs to
    pub room_id: RoomId,
    /// Opaque sender id
    pub sender: String,
    /// Message text
    pub body: String,
    /// Time the server received the message
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    /// Create a new message stamped with the current time
    pub fn new(room_id: RoomId, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            room_id,
            sender: sender.into(),
            body: body.into(),
            sent_at: Utc::now(),
        }
    }

    /// Override the receive timestamp
    pub fn at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = sent_at;
        self
    }

    /// Attach the store-assigned id, producing the persisted form
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            room_id: self.room_id,
            sender: self.sender,
            body: self.body,
            created_at: self.sent_at,
            updated_at: self.sent_at,
        }
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable message storage
///
/// Implementations synchronise themselves; callers never hold a lock across
/// these calls. Deadlines are enforced by the caller.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a message and return its assigned id
    async fn save(&self, message: &NewMessage) -> Result<MessageId, StoreError>;

    /// All messages of a room, oldest first
    async fn find_all_by_room(&self, room_id: RoomId) -> Result<Vec<Message>, StoreError>;

    /// The most recently created message of a room
    async fn find_latest_by_room(&self, room_id: RoomId) -> Result<Option<Message>, StoreError>;

    /// Remove every message of a room
    async fn delete_all_by_room(&self, room_id: RoomId) -> Result<(), StoreError>;
}
