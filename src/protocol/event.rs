//! Native duplex protocol events
//!
//! Client→server: `Join`, `Send`, `History`, `Latest`. Server→client: `Ack`,
//! `Error`, `Delivered`, and the `History`/`Latest` replies. The serde form is
//! what the WebSocket gateway writes to browsers.

use serde::{Deserialize, Serialize};

use crate::store::{Message, MessageId, RoomId};

/// Acknowledgement text sent after a successful join
pub const JOINED: &str = "joined";

/// Error text sent when the first event is not a valid join
pub const ROOM_NOT_SPECIFIED: &str = "room not specified";

/// Error text sent when a reply does not fit in one frame
pub const RESPONSE_TOO_LARGE: &str = "response too large";

/// Event sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Select the room to watch; must be the first event
    Join { room_id: RoomId },

    /// Post a message to the joined room
    Send {
        room_id: RoomId,
        text: String,
        sender_id: String,
        sent_at_unix: i64,
    },

    /// Ask for every stored message of a room
    History { room_id: RoomId },

    /// Ask for the latest stored message of a room
    Latest { room_id: RoomId },
}

impl ClientEvent {
    /// Create a join event
    pub fn join(room_id: RoomId) -> Self {
        Self::Join { room_id }
    }

    /// Create a send event
    pub fn send(
        room_id: RoomId,
        text: impl Into<String>,
        sender_id: impl Into<String>,
        sent_at_unix: i64,
    ) -> Self {
        Self::Send {
            room_id,
            text: text.into(),
            sender_id: sender_id.into(),
            sent_at_unix,
        }
    }

    /// Create a history request
    pub fn history(room_id: RoomId) -> Self {
        Self::History { room_id }
    }

    /// Create a latest-message request
    pub fn latest(room_id: RoomId) -> Self {
        Self::Latest { room_id }
    }
}

/// A stored message as carried in history replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub room_id: RoomId,
    pub text: String,
    pub sender_id: String,
    pub created_at_unix: i64,
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            text: message.body.clone(),
            sender_id: message.sender.clone(),
            created_at_unix: message.created_at.timestamp(),
        }
    }
}

/// Event sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The session joined its room
    Ack { message: String },

    /// The session was refused
    Error { message: String },

    /// A message was posted to the joined room
    Delivered {
        id: MessageId,
        room_id: RoomId,
        text: String,
        sender_id: String,
        created_at_unix: i64,
    },

    /// Stored messages of a room, oldest first
    History {
        room_id: RoomId,
        messages: Vec<MessageRecord>,
    },

    /// Latest stored message of a room, if any
    Latest {
        room_id: RoomId,
        message: Option<MessageRecord>,
    },
}

impl ServerEvent {
    /// Create an acknowledgement
    pub fn ack(message: impl Into<String>) -> Self {
        Self::Ack {
            message: message.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create a delivery for a stored message
    pub fn delivered(message: &Message) -> Self {
        Self::Delivered {
            id: message.id,
            room_id: message.room_id,
            text: message.body.clone(),
            sender_id: message.sender.clone(),
            created_at_unix: message.created_at.timestamp(),
        }
    }

    /// Create a history reply
    pub fn history(room_id: RoomId, messages: &[Message]) -> Self {
        Self::History {
            room_id,
            messages: messages.iter().map(MessageRecord::from).collect(),
        }
    }

    /// Create a latest-message reply
    pub fn latest(room_id: RoomId, message: Option<&Message>) -> Self {
        Self::Latest {
            room_id,
            message: message.map(MessageRecord::from),
        }
    }
}
