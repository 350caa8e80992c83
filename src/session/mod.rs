//! Per-connection stream sessions
//!
//! A session joins exactly one room and then runs two directions at once:
//! client sends are persisted through the message service, and room
//! deliveries are written back to the client.

pub mod context;
pub mod handler;
pub mod state;

pub use context::SessionContext;
pub use handler::SessionHandler;
pub use state::{SessionPhase, SessionState};
