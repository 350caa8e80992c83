//! Gateway text frames
//!
//! Inbound frames are JSON objects `{"message", "sender", "sent_at_unix"?}`,
//! or `{"type": "history"}` / `{"type": "latest"}` asking about the bridged
//! room. Outbound frames are the JSON form of [`ServerEvent`].

use chrono::Utc;
use serde::Deserialize;

use crate::protocol::{ClientEvent, ServerEvent};
use crate::store::RoomId;

/// Sent when the room path parameter is not a positive integer
pub const INVALID_ROOM_ID: &str = "invalid room id";

/// Sent when the native session could not be opened
pub const FAILED_TO_CONNECT: &str = "failed to connect stream";

/// Sent when the native session ended with an error
pub const STREAM_CLOSED: &str = "stream closed";

/// A message posted by a socket client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    pub message: String,
    pub sender: String,
    #[serde(default, alias = "sent_at")]
    pub sent_at_unix: Option<i64>,
}

impl InboundFrame {
    /// Parse a text frame, `None` if it is not a valid message object
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Convert to a native send event for `room_id`
    ///
    /// A missing or zero timestamp becomes the current time.
    pub fn into_event(self, room_id: RoomId) -> ClientEvent {
        let sent_at = match self.sent_at_unix {
            Some(ts) if ts != 0 => ts,
            _ => Utc::now().timestamp(),
        };

        ClientEvent::send(room_id, self.message, self.sender, sent_at)
    }
}

/// A history query from a socket client, always about the bridged room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundRequest {
    History,
    Latest,
}

impl InboundRequest {
    /// Parse a text frame, `None` if it is not a request object
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Convert to a native request for `room_id`
    pub fn into_event(self, room_id: RoomId) -> ClientEvent {
        match self {
            InboundRequest::History => ClientEvent::history(room_id),
            InboundRequest::Latest => ClientEvent::latest(room_id),
        }
    }
}

/// Turn a socket text frame into a native event, `None` if malformed
pub fn parse_inbound(text: &str, room_id: RoomId) -> Option<ClientEvent> {
    if let Some(request) = InboundRequest::parse(text) {
        return Some(request.into_event(room_id));
    }
    InboundFrame::parse(text).map(|frame| frame.into_event(room_id))
}

/// Parse the room path parameter
///
/// Only positive integers name a room.
pub fn parse_room_id(raw: &str) -> Option<RoomId> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(RoomId(id)),
    }
}

/// Encode a server event as a text frame payload
pub fn encode_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_room_id() {
        assert_eq!(parse_room_id("7"), Some(RoomId(7)));
        assert_eq!(parse_room_id("0"), None);
        assert_eq!(parse_room_id("-3"), None);
        assert_eq!(parse_room_id("abc"), None);
        assert_eq!(parse_room_id(""), None);
    }

    #[test]
    fn test_inbound_defaults_timestamp() {
        let frame = InboundFrame::parse(r#"{"message":"yo","sender":"u2"}"#).unwrap();
        let before = Utc::now().timestamp();

        match frame.into_event(RoomId(7)) {
            ClientEvent::Send {
                room_id,
                text,
                sender_id,
                sent_at_unix,
            } => {
                assert_eq!(room_id, RoomId(7));
                assert_eq!(text, "yo");
                assert_eq!(sender_id, "u2");
                assert!((sent_at_unix - before).abs() <= 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_inbound_keeps_timestamp() {
        let frame = InboundFrame::parse(r#"{"message":"a","sender":"b","sent_at":1700000000}"#)
            .unwrap();
        assert_eq!(frame.sent_at_unix, Some(1_700_000_000));

        let zero = InboundFrame::parse(r#"{"message":"a","sender":"b","sent_at_unix":0}"#)
            .unwrap()
            .into_event(RoomId(1));
        assert!(matches!(zero, ClientEvent::Send { sent_at_unix, .. } if sent_at_unix > 0));
    }

    #[test]
    fn test_malformed_inbound() {
        assert!(InboundFrame::parse(r#"{"message":"#).is_none());
        assert!(InboundFrame::parse(r#"{"sender":"u1"}"#).is_none());
        assert!(InboundFrame::parse("not json").is_none());
    }

    #[test]
    fn test_parse_inbound_requests() {
        assert_eq!(
            parse_inbound(r#"{"type":"history"}"#, RoomId(7)),
            Some(ClientEvent::history(RoomId(7)))
        );
        assert_eq!(
            parse_inbound(r#"{"type":"latest","room_id":99}"#, RoomId(7)),
            Some(ClientEvent::latest(RoomId(7)))
        );
        assert_eq!(parse_inbound(r#"{"type":"delete"}"#, RoomId(7)), None);
        assert!(matches!(
            parse_inbound(r#"{"message":"yo","sender":"u2"}"#, RoomId(7)),
            Some(ClientEvent::Send { .. })
        ));
    }

    #[test]
    fn test_encode_ack() {
        let text = encode_event(&ServerEvent::ack("joined")).unwrap();
        assert_eq!(text, r#"{"type":"ack","message":"joined"}"#);
    }
}
