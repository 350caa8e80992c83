//! Subscription handles
//!
//! A subscription is split in two: the [`Subscription`] owns the read side
//! of the delivery queue, the [`CancelHandle`] removes it from the registry.
//! Cancelling is idempotent and also happens when the last clone of the
//! handle is dropped, so a session cannot leak its registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::entry::SubscriberId;
use super::store::RoomRegistry;
use crate::store::{Message, RoomId};

/// Read side of a subscriber's delivery queue
#[derive(Debug)]
pub struct Subscription {
    room_id: RoomId,
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Message>>,
}

impl Subscription {
    pub(super) fn new(
        room_id: RoomId,
        id: SubscriberId,
        receiver: mpsc::Receiver<Arc<Message>>,
    ) -> Self {
        Self {
            room_id,
            id,
            receiver,
        }
    }

    /// Room this subscription is registered under
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Registry-unique subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the subscription has been cancelled and every
    /// queued message has been consumed.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    /// Take a queued message without waiting
    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Removes a subscription from the registry
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    registry: Weak<RoomRegistry>,
    room_id: RoomId,
    id: SubscriberId,
    cancelled: AtomicBool,
}

impl CancelHandle {
    pub(super) fn new(registry: &Arc<RoomRegistry>, room_id: RoomId, id: SubscriberId) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                registry: Arc::downgrade(registry),
                room_id,
                id,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Unregister the subscription and close its queue
    ///
    /// Only the first call has an effect.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has run
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl CancelInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        // A dropped registry has already closed every queue
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.room_id, self.id);
        }
    }
}

impl Drop for CancelInner {
    fn drop(&mut self) {
        self.cancel();
    }
}
