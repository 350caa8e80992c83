//! Native duplex protocol
//!
//! A session is one bidirectional stream of events:
//!
//! ```text
//!  client                                server
//!    │── Join{room} ───────────────────────►│
//!    │◄─────────────────────── Ack{joined} ─│
//!    │── Send{room, text, sender, at} ─────►│──► create_message
//!    │◄── Delivered{id, room, text, ..} ────│◄── room fan-out
//!    │── History{room} / Latest{room} ─────►│──► store read
//!    │◄──── History{..} / Latest{..} ───────│
//! ```
//!
//! Events are transport agnostic. They travel either as binary frames over
//! TCP ([`framed`]) or over an in-process channel pair ([`transport`]).

pub mod codec;
pub mod event;
pub mod framed;
pub mod transport;

pub use codec::{decode_frame, encode_frame, WireEvent, DEFAULT_MAX_FRAME_SIZE};
pub use event::{
    ClientEvent, MessageRecord, ServerEvent, JOINED, RESPONSE_TOO_LARGE, ROOM_NOT_SPECIFIED,
};
pub use framed::{split_tcp, FramedSink, FramedSource};
pub use transport::{
    channel, duplex_pair, ChannelSink, ChannelSource, ClientEnd, EventSink, EventSource,
    ServerEnd, DEFAULT_CHANNEL_CAPACITY,
};
