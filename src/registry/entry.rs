//! Per-room subscriber set
//!
//! Each room owns its own lock so that publishing to one room never waits on
//! subscribe/cancel traffic for another.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;

use crate::store::Message;

/// Identifier of a single subscription within the registry
pub type SubscriberId = u64;

/// Sending half of a subscriber's delivery queue
pub(super) type DeliverySender = mpsc::Sender<Arc<Message>>;

/// Entry for a single room in the registry
#[derive(Debug, Default)]
pub(super) struct RoomEntry {
    state: RwLock<RoomState>,
}

/// Lock-protected state of a room
#[derive(Debug, Default)]
pub(super) struct RoomState {
    /// The registry holds the only sender of each queue, so removing an
    /// entry here closes that subscriber's queue.
    pub subscribers: HashMap<SubscriberId, DeliverySender>,

    /// Set once the entry has been unlinked from the registry map.
    /// A retired entry must not accept new subscribers.
    pub retired: bool,
}

impl RoomEntry {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, RoomState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, RoomState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live subscribers
    pub(super) fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }
}
