//! Room registry implementation
//!
//! The central registry that maps rooms to their live subscribers and fans
//! published messages out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::config::RegistryConfig;
use super::entry::{RoomEntry, SubscriberId};
use super::subscription::{CancelHandle, Subscription};
use crate::stats::RegistryStats;
use crate::store::{Message, RoomId};

/// Result of offering one message to a room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers whose queue accepted the message
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
}

/// Registry of live room subscriptions
///
/// One instance per running server, shared as `Arc<RoomRegistry>`. The outer
/// map lock is only held long enough to find a room; the per-room lock
/// serialises subscribe/cancel against publish for that room alone.
#[derive(Debug)]
pub struct RoomRegistry {
    /// Map of room id to subscriber set
    rooms: RwLock<HashMap<RoomId, Arc<RoomEntry>>>,

    /// Configuration
    config: RegistryConfig,

    next_subscriber_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl RoomRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            next_subscriber_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to a room
    ///
    /// Returns the read side of a bounded delivery queue and the handle that
    /// removes it again.
    pub fn subscribe(self: &Arc<Self>, room_id: RoomId) -> (Subscription, CancelHandle) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let subscribers = loop {
            let entry = self.room_entry(room_id);
            let mut state = entry.write();

            // Lost a race with the removal of this (then empty) room
            if state.retired {
                continue;
            }

            state.subscribers.insert(id, tx);
            break state.subscribers.len();
        };

        tracing::debug!(
            room = %room_id,
            subscriber = id,
            subscribers = subscribers,
            "Subscriber added"
        );

        (
            Subscription::new(room_id, id, rx),
            CancelHandle::new(self, room_id, id),
        )
    }

    /// Remove a subscriber, closing its queue
    ///
    /// Returns false if the subscriber was not registered.
    pub(super) fn unsubscribe(&self, room_id: RoomId, id: SubscriberId) -> bool {
        let Some(entry) = self.read_rooms().get(&room_id).cloned() else {
            return false;
        };

        let now_empty = {
            let mut state = entry.write();
            // Dropping the removed sender closes the queue
            if state.subscribers.remove(&id).is_none() {
                return false;
            }
            state.subscribers.is_empty()
        };

        tracing::debug!(room = %room_id, subscriber = id, "Subscriber removed");

        if now_empty {
            let mut rooms = self.write_rooms();
            let mut state = entry.write();

            let still_linked = rooms
                .get(&room_id)
                .is_some_and(|current| Arc::ptr_eq(current, &entry));

            if still_linked && state.subscribers.is_empty() {
                rooms.remove(&room_id);
                state.retired = true;
                tracing::debug!(room = %room_id, "Room removed, no subscribers left");
            }
        }

        true
    }

    /// Offer a message to every subscriber of a room
    ///
    /// Never waits: a subscriber whose queue is full misses this message and
    /// the others are unaffected.
    pub fn publish(&self, room_id: RoomId, message: Arc<Message>) -> PublishOutcome {
        self.published.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.read_rooms().get(&room_id).cloned() else {
            return PublishOutcome::default();
        };

        let mut outcome = PublishOutcome::default();
        let state = entry.read();

        for (&subscriber, tx) in &state.subscribers {
            match tx.try_send(Arc::clone(&message)) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    outcome.dropped += 1;
                    tracing::debug!(
                        room = %room_id,
                        subscriber = subscriber,
                        message_id = message.id,
                        "Subscriber queue full, message dropped"
                    );
                }
                // Reader went away; its cancel handle will unlink it
                Err(TrySendError::Closed(_)) => {}
            }
        }
        drop(state);

        self.delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(outcome.dropped as u64, Ordering::Relaxed);

        outcome
    }

    /// Number of live subscribers in a room
    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.read_rooms()
            .get(&room_id)
            .map_or(0, |entry| entry.subscriber_count())
    }

    /// Number of rooms with at least one subscriber
    pub fn room_count(&self) -> usize {
        self.read_rooms().len()
    }

    /// Snapshot of registry counters
    pub fn stats(&self) -> RegistryStats {
        let rooms = self.read_rooms();

        RegistryStats {
            rooms: rooms.len(),
            subscribers: rooms.values().map(|entry| entry.subscriber_count()).sum(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn room_entry(&self, room_id: RoomId) -> Arc<RoomEntry> {
        if let Some(entry) = self.read_rooms().get(&room_id) {
            return Arc::clone(entry);
        }

        let mut rooms = self.write_rooms();
        Arc::clone(
            rooms
                .entry(room_id)
                .or_insert_with(|| Arc::new(RoomEntry::new())),
        )
    }

    fn read_rooms(&self) -> RwLockReadGuard<'_, HashMap<RoomId, Arc<RoomEntry>>> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_rooms(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, Arc<RoomEntry>>> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
