//! Message distribution service
//!
//! Persists new messages and then hands them to the room registry. Publishing
//! only ever happens after a successful save.

use std::future::Future;
use std::sync::Arc;

use super::config::ServiceConfig;
use crate::error::{ServiceError, StoreError, ValidationError};
use crate::registry::{CancelHandle, PublishOutcome, RoomRegistry, Subscription};
use crate::store::{Message, MessageStore, NewMessage, RoomId};

/// Orchestrates persist-then-fan-out and the subscription lifecycle
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    registry: Arc<RoomRegistry>,
    config: ServiceConfig,
}

impl MessageService {
    /// Create a service over a store and a registry
    pub fn new(store: Arc<dyn MessageStore>, registry: Arc<RoomRegistry>) -> Self {
        Self::with_config(store, registry, ServiceConfig::default())
    }

    /// Create a service with custom configuration
    pub fn with_config(
        store: Arc<dyn MessageStore>,
        registry: Arc<RoomRegistry>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Get the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Validate, persist and publish a message
    ///
    /// Returns the stored message once every current subscriber of the room
    /// has been offered it. A validation or storage failure publishes nothing.
    pub async fn create_message(&self, message: NewMessage) -> Result<Arc<Message>, ServiceError> {
        validate(&message)?;

        let id = self.with_deadline(self.store.save(&message)).await?;
        let room_id = message.room_id;
        let message = Arc::new(message.into_message(id));

        let PublishOutcome { delivered, dropped } =
            self.registry.publish(room_id, Arc::clone(&message));

        tracing::trace!(
            room = %room_id,
            message_id = id,
            delivered = delivered,
            dropped = dropped,
            "Message published"
        );

        Ok(message)
    }

    /// Subscribe to live messages of a room
    pub fn subscribe_room(&self, room_id: RoomId) -> (Subscription, CancelHandle) {
        self.registry.subscribe(room_id)
    }

    /// All stored messages of a room
    pub async fn find_all_by_room(&self, room_id: RoomId) -> Result<Vec<Message>, ServiceError> {
        Ok(self.with_deadline(self.store.find_all_by_room(room_id)).await?)
    }

    /// The latest stored message of a room
    pub async fn find_latest_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Message>, ServiceError> {
        Ok(self
            .with_deadline(self.store.find_latest_by_room(room_id))
            .await?)
    }

    /// Delete every stored message of a room
    pub async fn delete_all_by_room(&self, room_id: RoomId) -> Result<(), ServiceError> {
        self.with_deadline(self.store.delete_all_by_room(room_id))
            .await?;
        tracing::info!(room = %room_id, "Room messages deleted");
        Ok(())
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let deadline = self.config.store_timeout;
        tokio::time::timeout(deadline, operation)
            .await
            .map_err(|_| StoreError::Timeout(deadline))?
    }
}

fn validate(message: &NewMessage) -> Result<(), ValidationError> {
    if message.room_id.is_unset() {
        return Err(ValidationError::MissingRoom);
    }
    if message.sender.is_empty() {
        return Err(ValidationError::MissingSender);
    }
    if message.body.is_empty() {
        return Err(ValidationError::EmptyBody);
    }
    Ok(())
}
