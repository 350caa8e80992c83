//! Binary wire codec for the native protocol
//!
//! Frame layout:
//! ```text
//! +----------------+--------+------------------+
//! | length (u32BE) | kind   | fields ...       |
//! +----------------+--------+------------------+
//!                  |<------ length bytes ----->|
//! ```
//!
//! Kinds:
//! ```text
//! 0x01 - Join      room u32
//! 0x02 - Send      room u32, text str, sender str, sent_at i64
//! 0x03 - History   room u32
//! 0x04 - Latest    room u32
//! 0x10 - Ack       message str
//! 0x11 - Error     message str
//! 0x12 - Delivered id u64, room u32, text str, sender str, created_at i64
//! 0x13 - History   room u32, count u32, record * count
//! 0x14 - Latest    room u32, present u8, [record]
//! ```
//!
//! A record has the same fields as Delivered. Strings are a u32 BE byte length
//! followed by UTF-8. All integers are big endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::event::{ClientEvent, MessageRecord, ServerEvent};
use crate::error::CodecError;
use crate::store::RoomId;

/// Default maximum frame payload size (64KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Size of the length prefix
const LENGTH_PREFIX: usize = 4;

/// Smallest encoded record: id, room, two empty strings, created_at
const MIN_RECORD_SIZE: usize = 8 + 4 + 4 + 4 + 8;

const KIND_JOIN: u8 = 0x01;
const KIND_SEND: u8 = 0x02;
const KIND_HISTORY_REQUEST: u8 = 0x03;
const KIND_LATEST_REQUEST: u8 = 0x04;
const KIND_ACK: u8 = 0x10;
const KIND_ERROR: u8 = 0x11;
const KIND_DELIVERED: u8 = 0x12;
const KIND_HISTORY: u8 = 0x13;
const KIND_LATEST: u8 = 0x14;

/// An event that can travel in a native frame
pub trait WireEvent: Sized + Send + 'static {
    /// Write kind byte and fields
    fn encode(&self, buf: &mut BytesMut);

    /// Read kind byte and fields from a complete frame payload
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError>;
}

impl WireEvent for ClientEvent {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            ClientEvent::Join { room_id } => {
                buf.put_u8(KIND_JOIN);
                buf.put_u32(room_id.get());
            }
            ClientEvent::Send {
                room_id,
                text,
                sender_id,
                sent_at_unix,
            } => {
                buf.put_u8(KIND_SEND);
                buf.put_u32(room_id.get());
                put_string(buf, text);
                put_string(buf, sender_id);
                buf.put_i64(*sent_at_unix);
            }
            ClientEvent::History { room_id } => {
                buf.put_u8(KIND_HISTORY_REQUEST);
                buf.put_u32(room_id.get());
            }
            ClientEvent::Latest { room_id } => {
                buf.put_u8(KIND_LATEST_REQUEST);
                buf.put_u32(room_id.get());
            }
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        match get_u8(buf)? {
            KIND_JOIN => Ok(ClientEvent::Join {
                room_id: RoomId(get_u32(buf)?),
            }),
            KIND_SEND => Ok(ClientEvent::Send {
                room_id: RoomId(get_u32(buf)?),
                text: get_string(buf)?,
                sender_id: get_string(buf)?,
                sent_at_unix: get_i64(buf)?,
            }),
            KIND_HISTORY_REQUEST => Ok(ClientEvent::History {
                room_id: RoomId(get_u32(buf)?),
            }),
            KIND_LATEST_REQUEST => Ok(ClientEvent::Latest {
                room_id: RoomId(get_u32(buf)?),
            }),
            kind => Err(CodecError::UnknownKind(kind)),
        }
    }
}

impl WireEvent for ServerEvent {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            ServerEvent::Ack { message } => {
                buf.put_u8(KIND_ACK);
                put_string(buf, message);
            }
            ServerEvent::Error { message } => {
                buf.put_u8(KIND_ERROR);
                put_string(buf, message);
            }
            ServerEvent::Delivered {
                id,
                room_id,
                text,
                sender_id,
                created_at_unix,
            } => {
                buf.put_u8(KIND_DELIVERED);
                buf.put_u64(*id);
                buf.put_u32(room_id.get());
                put_string(buf, text);
                put_string(buf, sender_id);
                buf.put_i64(*created_at_unix);
            }
            ServerEvent::History { room_id, messages } => {
                buf.put_u8(KIND_HISTORY);
                buf.put_u32(room_id.get());
                buf.put_u32(messages.len() as u32);
                for record in messages {
                    put_record(buf, record);
                }
            }
            ServerEvent::Latest { room_id, message } => {
                buf.put_u8(KIND_LATEST);
                buf.put_u32(room_id.get());
                match message {
                    Some(record) => {
                        buf.put_u8(1);
                        put_record(buf, record);
                    }
                    None => buf.put_u8(0),
                }
            }
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        match get_u8(buf)? {
            KIND_ACK => Ok(ServerEvent::Ack {
                message: get_string(buf)?,
            }),
            KIND_ERROR => Ok(ServerEvent::Error {
                message: get_string(buf)?,
            }),
            KIND_DELIVERED => Ok(ServerEvent::Delivered {
                id: get_u64(buf)?,
                room_id: RoomId(get_u32(buf)?),
                text: get_string(buf)?,
                sender_id: get_string(buf)?,
                created_at_unix: get_i64(buf)?,
            }),
            KIND_HISTORY => {
                let room_id = RoomId(get_u32(buf)?);
                let count = get_u32(buf)?;
                let capacity = (count as usize).min(buf.remaining() / MIN_RECORD_SIZE);
                let mut messages = Vec::with_capacity(capacity);
                for _ in 0..count {
                    messages.push(get_record(buf)?);
                }
                Ok(ServerEvent::History { room_id, messages })
            }
            KIND_LATEST => {
                let room_id = RoomId(get_u32(buf)?);
                let message = match get_u8(buf)? {
                    0 => None,
                    _ => Some(get_record(buf)?),
                };
                Ok(ServerEvent::Latest { room_id, message })
            }
            kind => Err(CodecError::UnknownKind(kind)),
        }
    }
}

/// Append one length-prefixed frame to `dst`
///
/// On error `dst` is left as it was.
pub fn encode_frame<E: WireEvent>(
    event: &E,
    dst: &mut BytesMut,
    max_frame_size: usize,
) -> Result<(), CodecError> {
    let prefix_at = dst.len();
    dst.put_u32(0);
    event.encode(dst);

    let size = dst.len() - prefix_at - LENGTH_PREFIX;
    if size > max_frame_size {
        dst.truncate(prefix_at);
        return Err(CodecError::FrameTooLarge {
            size,
            limit: max_frame_size,
        });
    }

    dst[prefix_at..prefix_at + LENGTH_PREFIX].copy_from_slice(&(size as u32).to_be_bytes());
    Ok(())
}

/// Take one complete frame off the front of `src`
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn decode_frame<E: WireEvent>(
    src: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Option<E>, CodecError> {
    if src.len() < LENGTH_PREFIX {
        return Ok(None);
    }

    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
    let size = u32::from_be_bytes(prefix) as usize;

    if size > max_frame_size {
        return Err(CodecError::FrameTooLarge {
            size,
            limit: max_frame_size,
        });
    }

    if src.len() < LENGTH_PREFIX + size {
        src.reserve(LENGTH_PREFIX + size - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX);
    let mut payload = src.split_to(size).freeze();
    let event = E::decode(&mut payload)?;

    if payload.has_remaining() {
        return Err(CodecError::TrailingBytes(payload.remaining()));
    }

    Ok(Some(event))
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn put_record(buf: &mut BytesMut, record: &MessageRecord) {
    buf.put_u64(record.id);
    buf.put_u32(record.room_id.get());
    put_string(buf, &record.text);
    put_string(buf, &record.sender_id);
    buf.put_i64(record.created_at_unix);
}

fn get_record(buf: &mut Bytes) -> Result<MessageRecord, CodecError> {
    Ok(MessageRecord {
        id: get_u64(buf)?,
        room_id: RoomId(get_u32(buf)?),
        text: get_string(buf)?,
        sender_id: get_string(buf)?,
        created_at_unix: get_i64(buf)?,
    })
}

fn get_u8(buf: &mut Bytes) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut Bytes) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut Bytes) -> Result<u64, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u64())
}

fn get_i64(buf: &mut Bytes) -> Result<i64, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_i64())
}

fn get_string(buf: &mut Bytes) -> Result<String, CodecError> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::UnexpectedEof);
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}
