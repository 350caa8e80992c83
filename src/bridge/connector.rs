//! Opening native sessions for the gateway

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::protocol::{duplex_pair, ClientEvent, EventSink, EventSource, ServerEvent};
use crate::session::{SessionContext, SessionHandler};
use crate::stats::ConnectionKind;

/// Boxed client-side sink of a native session
pub type BoxEventSink = Box<dyn EventSink<ClientEvent>>;

/// Boxed client-side source of a native session
pub type BoxEventSource = Box<dyn EventSource<ServerEvent>>;

/// Opens native duplex sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new session, returning its client side
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError>;
}

/// Runs sessions on a handler in the same process
pub struct InProcessConnector {
    handler: SessionHandler,
    next_session_id: Arc<AtomicU64>,
    capacity: usize,
}

impl InProcessConnector {
    /// Create a connector with its own session id sequence
    pub fn new(handler: SessionHandler, capacity: usize) -> Self {
        Self::with_session_ids(handler, capacity, Arc::new(AtomicU64::new(1)))
    }

    /// Create a connector sharing a session id sequence
    pub fn with_session_ids(
        handler: SessionHandler,
        capacity: usize,
        next_session_id: Arc<AtomicU64>,
    ) -> Self {
        Self {
            handler,
            next_session_id,
            capacity,
        }
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (client, server) = duplex_pair(self.capacity);
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let ctx = SessionContext::new(session_id, ConnectionKind::Gateway);
            if let Err(e) = handler.handle(ctx, server.source, server.sink).await {
                tracing::debug!(session_id = session_id, error = %e, "Gateway session ended");
            }
        });

        Ok((Box::new(client.sink), Box::new(client.source)))
    }
}
