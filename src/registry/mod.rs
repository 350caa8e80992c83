//! Room subscription registry
//!
//! The registry maps each room to the delivery queues of the sessions
//! currently watching it and fans published messages out to them.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<RoomRegistry>
//!                    ┌──────────────────────────┐
//!                    │ rooms: HashMap<RoomId,   │
//!                    │   RoomEntry {            │
//!                    │     subscribers: {id→tx} │
//!                    │   }                      │
//!                    │ >                        │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [MessageService]        [Session A]             [Session B]
//!   create_message()        sub.recv()              sub.recv()
//!         │                       │                       │
//!         └──► registry.publish() ─► try_send ─► Delivered ─► transport
//! ```
//!
//! # Backpressure
//!
//! Queues are bounded (10 slots by default). Publishing never waits: a full
//! queue loses that one message for that one subscriber. The durable copy is
//! in the message store, so a lagging client can backfill from there.

pub mod config;
pub mod entry;
pub mod store;
pub mod subscription;

pub use config::RegistryConfig;
pub use entry::SubscriberId;
pub use store::{PublishOutcome, RoomRegistry};
pub use subscription::{CancelHandle, Subscription};
