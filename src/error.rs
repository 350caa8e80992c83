//! Error types
//!
//! The failure taxonomy of the fan-out core:
//!
//! - [`ValidationError`]: a message was rejected before it reached the store
//! - [`StoreError`]: the message store failed or missed its deadline
//! - [`CodecError`]: a native frame could not be decoded
//! - [`TransportError`]: a connection failed or closed
//! - [`SessionError`]: how a session terminated abnormally
//!
//! A subscriber queue filling up is not an error and has no type here.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A message failed validation and was neither persisted nor published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("room id is required")]
    MissingRoom,

    #[error("sender id is required")]
    MissingSender,

    #[error("message body must not be empty")]
    EmptyBody,
}

/// Failure reported by a message store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Failure of a distribution service operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Native frame decoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown event kind 0x{0:02x}")]
    UnknownKind(u8),

    #[error("unexpected end of frame")]
    UnexpectedEof,

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("string field is not valid utf-8")]
    InvalidUtf8,

    #[error("{0} trailing bytes after event")]
    TrailingBytes(usize),
}

/// Connection-level failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("connection closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Abnormal end of a stream session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer broke the join handshake
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
