//! Message distribution service
//!
//! Sits between the sessions and the two collaborators below them: the
//! durable [`MessageStore`](crate::store::MessageStore) and the in-process
//! [`RoomRegistry`](crate::registry::RoomRegistry).
//!
//! ```text
//! session ─► create_message ─► validate ─► store.save ─► registry.publish
//! ```

pub mod config;
pub mod message;

pub use config::ServiceConfig;
pub use message::MessageService;
