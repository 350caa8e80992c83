//! Server implementation
//!
//! [`ChatServer`] listens on two addresses: the native framed protocol and the
//! WebSocket gateway. Both reach the same session handler and registry.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::{serve_gateway, ChatServer};
