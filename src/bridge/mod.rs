//! WebSocket gateway bridge
//!
//! Lets a socket client that speaks one JSON object per text frame reach a
//! room through a native duplex session:
//!
//! ```text
//!  socket                     Bridge                      native session
//!    │── {"message",..} ──► reader task ── Send ──────────►│
//!    │── {"type":"history"} ─► reader ── History ─────────►│
//!    │◄── {"type":..} ───── writer loop ◄── Ack/Delivered ─│
//! ```
//!
//! Malformed inbound frames are skipped. When the socket stops reading, the
//! native side is told no more sends are coming, and the bridge finishes once
//! the native session closes its outbound side.

pub mod connector;
pub mod frame;

use std::sync::Arc;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::protocol::{ClientEvent, EventSink, EventSource};
use crate::store::RoomId;

pub use connector::{BoxEventSink, BoxEventSource, Connector, InProcessConnector};
pub use frame::{
    encode_event, parse_inbound, parse_room_id, InboundFrame, InboundRequest, FAILED_TO_CONNECT,
    INVALID_ROOM_ID, STREAM_CLOSED,
};

/// Default path prefix of gateway requests
pub const DEFAULT_PATH_PREFIX: &str = "/api/v1/ws/rooms/";

/// Extract the raw room parameter from a request path
///
/// Returns `None` if the path is outside `prefix`. The returned parameter is
/// not validated.
pub fn room_path_param<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let path = path.split('?').next().unwrap_or(path);
    path.strip_prefix(prefix).map(|rest| rest.trim_end_matches('/'))
}

/// Bridges socket connections to native sessions
#[derive(Clone)]
pub struct Bridge {
    connector: Arc<dyn Connector>,
}

impl Bridge {
    /// Create a bridge opening sessions through `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Serve one socket connection for the room named by `raw_room_id`
    ///
    /// Returns once both directions have finished. Every end of the native
    /// session writes a diagnostic frame first; only a receive failure is
    /// returned as an error.
    pub async fn serve<S>(
        &self,
        ws: WebSocketStream<S>,
        raw_room_id: &str,
    ) -> Result<(), TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_tx, ws_rx) = ws.split();

        let Some(room_id) = parse_room_id(raw_room_id) else {
            tracing::debug!(raw = raw_room_id, "Rejecting gateway connection");
            ws_tx.send(Message::text(INVALID_ROOM_ID)).await?;
            let _ = ws_tx.close().await;
            return Ok(());
        };

        let (mut native_tx, mut native_rx) = match self.connector.connect().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(room = %room_id, error = %e, "Failed to open native session");
                let _ = ws_tx.send(Message::text(FAILED_TO_CONNECT)).await;
                let _ = ws_tx.close().await;
                return Err(e);
            }
        };

        if let Err(e) = native_tx.send(ClientEvent::join(room_id)).await {
            tracing::debug!(room = %room_id, error = %e, "Failed to send join");
            let _ = ws_tx.send(Message::text(FAILED_TO_CONNECT)).await;
            let _ = ws_tx.close().await;
            return Err(e);
        }

        let shutdown = CancellationToken::new();
        let reader = tokio::spawn(forward_inbound(ws_rx, native_tx, room_id, shutdown.clone()));

        let result = loop {
            let event = match native_rx.recv().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    let _ = ws_tx.send(Message::text(STREAM_CLOSED)).await;
                    break Err(e);
                }
                None => {
                    let _ = ws_tx.send(Message::text(STREAM_CLOSED)).await;
                    break Ok(());
                }
            };

            let text = match encode_event(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(room = %room_id, error = %e, "Failed to encode event");
                    continue;
                }
            };

            if let Err(e) = ws_tx.send(Message::text(text)).await {
                break Err(e.into());
            }
        };

        shutdown.cancel();
        let _ = ws_tx.close().await;
        drop(native_rx);
        let _ = reader.await;

        tracing::debug!(room = %room_id, "Gateway connection closed");
        result
    }
}

/// Forward socket frames as native sends until the socket ends
async fn forward_inbound<S>(
    mut ws_rx: SplitStream<WebSocketStream<S>>,
    mut native_tx: BoxEventSink,
    room_id: RoomId,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = ws_rx.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            // Control frames are answered by tungstenite
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(room = %room_id, error = %e, "Socket read failed");
                break;
            }
        };

        let Some(event) = parse_inbound(text.as_str(), room_id) else {
            tracing::debug!(room = %room_id, "Skipping malformed frame");
            continue;
        };

        let sent = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = native_tx.send(event) => result,
        };
        if let Err(e) = sent {
            tracing::debug!(room = %room_id, error = %e, "Native send failed");
            break;
        }
    }

    // No more sends; the outbound side keeps running until the session closes it
    let _ = native_tx.close().await;
}
