//! Room message fan-out server
//!
//! Accepts chat messages, persists them through a [`MessageStore`], and
//! delivers each one live to every session watching its room. Sessions speak
//! either the native framed duplex protocol over TCP or JSON over a WebSocket
//! gateway that bridges to the native protocol. Joined sessions can also ask
//! for the stored history of a room to backfill after a reconnect.
//!
//! ```text
//!  native client ──TCP──┐
//!                       ├─► SessionHandler ─► MessageService ─► MessageStore
//!  browser ──WS─► Bridge┘         ▲                 │
//!                                 └── RoomRegistry ◄┘ publish
//! ```
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use roomcast::{ChatServer, InMemoryMessageStore, ServerConfig};
//!
//! # async fn example() -> roomcast::error::Result<()> {
//! let server = ChatServer::new(ServerConfig::default(), Arc::new(InMemoryMessageStore::new()));
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`MessageStore`]: store::MessageStore

pub mod bridge;
pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod service;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
pub use registry::{CancelHandle, RoomRegistry, Subscription};
pub use server::{ChatServer, ServerConfig};
pub use service::MessageService;
pub use store::{InMemoryMessageStore, Message, MessageStore, NewMessage, RoomId};
