//! Transport abstraction for duplex sessions
//!
//! A session only ever sees a stream of incoming events ([`EventSource`])
//! and a place to write outgoing ones ([`EventSink`]). The two halves are
//! separate values so they can be driven from different tasks.
//!
//! Two implementations ship with the crate: the framed TCP transport in
//! [`framed`](super::framed) and the in-process channel pair below, which the
//! gateway uses to reach a session handler in the same process.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::event::{ClientEvent, ServerEvent};
use crate::error::TransportError;

/// Default capacity of in-process channel transports
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Incoming half of a duplex connection
#[async_trait]
pub trait EventSource<T: Send + 'static>: Send {
    /// Wait for the next event
    ///
    /// `None` is a clean end of input. Must be cancel safe.
    async fn recv(&mut self) -> Option<Result<T, TransportError>>;
}

/// Outgoing half of a duplex connection
#[async_trait]
pub trait EventSink<T: Send + 'static>: Send {
    /// Write one event
    async fn send(&mut self, event: T) -> Result<(), TransportError>;

    /// Signal that no more events will be sent
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Send + 'static, S: EventSource<T> + ?Sized> EventSource<T> for Box<S> {
    async fn recv(&mut self) -> Option<Result<T, TransportError>> {
        (**self).recv().await
    }
}

#[async_trait]
impl<T: Send + 'static, S: EventSink<T> + ?Sized> EventSink<T> for Box<S> {
    async fn send(&mut self, event: T) -> Result<(), TransportError> {
        (**self).send(event).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }
}

/// Receiving end of an in-process channel transport
#[derive(Debug)]
pub struct ChannelSource<T> {
    rx: mpsc::Receiver<T>,
}

/// Sending end of an in-process channel transport
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: Option<mpsc::Sender<T>>,
}

#[async_trait]
impl<T: Send + 'static> EventSource<T> for ChannelSource<T> {
    async fn recv(&mut self) -> Option<Result<T, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

#[async_trait]
impl<T: Send + 'static> EventSink<T> for ChannelSink<T> {
    async fn send(&mut self, event: T) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(event).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx.take();
        Ok(())
    }
}

/// One-directional in-process channel
pub fn channel<T>(capacity: usize) -> (ChannelSink<T>, ChannelSource<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx: Some(tx) }, ChannelSource { rx })
}

/// Client side of an in-process duplex connection
#[derive(Debug)]
pub struct ClientEnd {
    pub sink: ChannelSink<ClientEvent>,
    pub source: ChannelSource<ServerEvent>,
}

/// Server side of an in-process duplex connection
#[derive(Debug)]
pub struct ServerEnd {
    pub source: ChannelSource<ClientEvent>,
    pub sink: ChannelSink<ServerEvent>,
}

/// Create a connected in-process duplex pair
pub fn duplex_pair(capacity: usize) -> (ClientEnd, ServerEnd) {
    let (client_sink, server_source) = channel(capacity);
    let (server_sink, client_source) = channel(capacity);

    (
        ClientEnd {
            sink: client_sink,
            source: client_source,
        },
        ServerEnd {
            source: server_source,
            sink: server_sink,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RoomId;

    #[tokio::test]
    async fn test_duplex_pair_both_directions() {
        let (mut client, mut server) = duplex_pair(4);

        client.sink.send(ClientEvent::join(RoomId(1))).await.unwrap();
        let event = server.source.recv().await.unwrap().unwrap();
        assert_eq!(event, ClientEvent::join(RoomId(1)));

        server.sink.send(ServerEvent::ack("joined")).await.unwrap();
        let event = client.source.recv().await.unwrap().unwrap();
        assert_eq!(event, ServerEvent::ack("joined"));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (mut client, mut server) = duplex_pair(4);

        client.sink.close().await.unwrap();
        assert!(server.source.recv().await.is_none());

        // Sending after close is a transport error
        let result = client.sink.send(ClientEvent::join(RoomId(1))).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (client, mut server) = duplex_pair(4);
        drop(client);

        let result = server.sink.send(ServerEvent::ack("joined")).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
