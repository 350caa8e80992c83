//! Stream session handler
//!
//! Drives one duplex session over any [`EventSource`]/[`EventSink`] pair:
//!
//! 1. The first event must be a join naming a room. Anything else gets a
//!    single error event and ends the session.
//! 2. After the join is acknowledged, a reader task turns each incoming send
//!    into a persisted message while the handler itself writes every message
//!    delivered to the room back to the peer.
//!    History and latest-message requests are answered in order with the
//!    reader's other work, and their replies share the writer.
//! 3. Whichever side finishes first cancels the other. The subscription is
//!    cancelled exactly once and the handler returns the reader's terminal
//!    error, if any.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::context::SessionContext;
use super::state::SessionState;
use crate::error::{ServiceError, SessionError, TransportError};
use crate::protocol::{
    ClientEvent, EventSink, EventSource, ServerEvent, JOINED, RESPONSE_TOO_LARGE,
    ROOM_NOT_SPECIFIED,
};
use crate::service::MessageService;
use crate::store::{NewMessage, RoomId};

/// Pending history replies per session
const REPLY_CAPACITY: usize = 4;

/// Handles duplex stream sessions against a message service
#[derive(Clone)]
pub struct SessionHandler {
    service: Arc<MessageService>,
}

impl SessionHandler {
    /// Create a handler
    pub fn new(service: Arc<MessageService>) -> Self {
        Self { service }
    }

    /// Get the message service
    pub fn service(&self) -> &Arc<MessageService> {
        &self.service
    }

    /// Run a session to completion
    ///
    /// A clean end of input, before or after joining, is `Ok(())`.
    pub async fn handle<S, K>(
        &self,
        ctx: SessionContext,
        mut source: S,
        mut sink: K,
    ) -> Result<(), SessionError>
    where
        S: EventSource<ClientEvent> + 'static,
        K: EventSink<ServerEvent>,
    {
        let mut state = SessionState::new(ctx.session_id);

        let room_id = match source.recv().await {
            None => {
                state.terminate();
                return Ok(());
            }
            Some(Err(e)) => {
                state.terminate();
                return Err(e.into());
            }
            Some(Ok(ClientEvent::Join { room_id })) if !room_id.is_unset() => room_id,
            Some(Ok(event)) => {
                tracing::debug!(
                    session_id = ctx.session_id,
                    event = ?event,
                    "First event is not a join with a room"
                );
                state.terminate();

                // The peer may already be gone
                let _ = sink.send(ServerEvent::error(ROOM_NOT_SPECIFIED)).await;
                let _ = sink.close().await;
                return Err(SessionError::Protocol(ROOM_NOT_SPECIFIED.into()));
            }
        };

        state.join(room_id);
        let (mut subscription, cancel) = self.service.subscribe_room(room_id);

        tracing::info!(
            session_id = ctx.session_id,
            peer = ?ctx.peer_addr,
            kind = ?ctx.kind,
            room = %room_id,
            "Session joined room"
        );

        if let Err(e) = sink.send(ServerEvent::ack(JOINED)).await {
            tracing::debug!(session_id = ctx.session_id, error = %e, "Failed to acknowledge join");
            cancel.cancel();
            state.terminate();
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        // Also stops the reader if this future is dropped mid-session
        let _shutdown_guard = shutdown.clone().drop_guard();
        let (reply_tx, mut replies) = mpsc::channel(REPLY_CAPACITY);
        let reader = tokio::spawn(read_loop(
            source,
            Arc::clone(&self.service),
            room_id,
            ctx.session_id,
            reply_tx,
            shutdown.clone(),
        ));

        loop {
            let event = tokio::select! {
                biased;
                Some(reply) = replies.recv() => reply,
                _ = shutdown.cancelled() => break,
                next = subscription.recv() => match next {
                    Some(message) => ServerEvent::delivered(&message),
                    // Queue closed by the registry
                    None => break,
                },
            };
            let is_delivery = matches!(event, ServerEvent::Delivered { .. });

            // A write that is ready wins over shutdown, so queued replies drain
            let written = tokio::select! {
                biased;
                result = sink.send(event) => result,
                _ = shutdown.cancelled() => break,
            };

            match written {
                Ok(()) if is_delivery => state.messages_delivered += 1,
                Ok(()) => {}
                // Nothing was written; the connection is still usable
                Err(TransportError::Codec(e)) => {
                    tracing::warn!(
                        session_id = ctx.session_id,
                        error = %e,
                        "Dropping event that does not fit a frame"
                    );
                    if !is_delivery {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = sink.send(ServerEvent::error(RESPONSE_TOO_LARGE)) => {}
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = ctx.session_id,
                        error = %e,
                        "Delivery write failed"
                    );
                    break;
                }
            }
        }

        shutdown.cancel();
        cancel.cancel();
        drop(subscription);
        let _ = sink.close().await;

        let result = match reader.await {
            Ok((result, sent)) => {
                state.messages_sent = sent;
                result
            }
            Err(e) => {
                tracing::warn!(
                    session_id = ctx.session_id,
                    error = %e,
                    "Session reader task failed"
                );
                Ok(())
            }
        };

        state.terminate();

        tracing::info!(
            session_id = ctx.session_id,
            room = %room_id,
            sent = state.messages_sent,
            delivered = state.messages_delivered,
            duration_ms = state.duration().as_millis() as u64,
            "Session closed"
        );

        result.map_err(SessionError::from)
    }
}

/// Consume client events until end of input, an error, or cancellation
///
/// Returns the terminal transport error, if any, and the number of messages
/// successfully created. Replies to history requests go to the writer through
/// `replies`.
async fn read_loop<S>(
    mut source: S,
    service: Arc<MessageService>,
    room_id: RoomId,
    session_id: u64,
    replies: mpsc::Sender<ServerEvent>,
    shutdown: CancellationToken,
) -> (Result<(), TransportError>, u64)
where
    S: EventSource<ClientEvent>,
{
    // Unblocks the writer however this task ends
    let _guard = shutdown.clone().drop_guard();
    let mut sent = 0;

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => return (Ok(()), sent),
            event = source.recv() => event,
        };

        let event = match event {
            None => return (Ok(()), sent),
            Some(Err(e)) => return (Err(e), sent),
            Some(Ok(event)) => event,
        };

        let reply = match event {
            ClientEvent::Send {
                room_id: target,
                text,
                sender_id,
                ..
            } => {
                if target != room_id {
                    tracing::debug!(
                        session_id,
                        room = %room_id,
                        requested = %target,
                        "Send names another room, using joined room"
                    );
                }

                // Server receive time; the client timestamp is advisory only
                let message = NewMessage::new(room_id, sender_id, text);

                match service.create_message(message).await {
                    Ok(_) => sent += 1,
                    Err(ServiceError::Validation(e)) => {
                        tracing::debug!(
                            session_id,
                            room = %room_id,
                            error = %e,
                            "Rejected message"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id,
                            room = %room_id,
                            error = %e,
                            "Failed to create message"
                        );
                    }
                }
                continue;
            }
            ClientEvent::Join { room_id: other } => {
                tracing::debug!(session_id, room = %other, "Ignoring join on subscribed session");
                continue;
            }
            ClientEvent::History { room_id: target } if !target.is_unset() => {
                match service.find_all_by_room(target).await {
                    Ok(messages) => ServerEvent::history(target, &messages),
                    Err(e) => query_failed(session_id, target, e),
                }
            }
            ClientEvent::Latest { room_id: target } if !target.is_unset() => {
                match service.find_latest_by_room(target).await {
                    Ok(message) => ServerEvent::latest(target, message.as_ref()),
                    Err(e) => query_failed(session_id, target, e),
                }
            }
            ClientEvent::History { .. } | ClientEvent::Latest { .. } => {
                ServerEvent::error(ROOM_NOT_SPECIFIED)
            }
        };

        let queued = tokio::select! {
            _ = shutdown.cancelled() => false,
            result = replies.send(reply) => result.is_ok(),
        };
        if !queued {
            return (Ok(()), sent);
        }
    }
}

fn query_failed(session_id: u64, room_id: RoomId, error: ServiceError) -> ServerEvent {
    tracing::warn!(session_id, room = %room_id, error = %error, "History query failed");
    ServerEvent::error(error.to_string())
}
