//! Native protocol client
//!
//! Speaks the framed TCP protocol to a remote server. The gateway uses
//! [`TcpConnector`] when it runs in front of a separate native server.

use std::io;

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::config::ClientConfig;
use crate::bridge::{BoxEventSink, BoxEventSource, Connector};
use crate::error::{SessionError, TransportError};
use crate::protocol::{
    split_tcp, ClientEvent, EventSink, EventSource, FramedSink, FramedSource, ServerEvent,
};
use crate::store::RoomId;

/// Client-side sink over TCP
pub type TcpEventSink = FramedSink<OwnedWriteHalf, ClientEvent>;

/// Client-side source over TCP
pub type TcpEventSource = FramedSource<OwnedReadHalf, ServerEvent>;

/// Connection to a native server
///
/// # Example
/// ```no_run
/// use roomcast::client::{ChatClient, ClientConfig};
/// use roomcast::store::RoomId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::new("127.0.0.1:50051".parse()?);
/// let mut client = ChatClient::connect(&config).await?;
///
/// client.join(RoomId::new(42)).await?;
/// client.send_message(RoomId::new(42), "hello", "alice").await?;
///
/// while let Some(event) = client.next_event().await {
///     println!("{:?}", event?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    sink: TcpEventSink,
    source: TcpEventSource,
}

impl ChatClient {
    /// Connect to the server
    pub async fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        tracing::debug!(addr = %config.addr, "Connected to native server");

        let (source, sink) = split_tcp(stream, config.max_frame_size);
        Ok(Self { sink, source })
    }

    /// Join a room and wait for the acknowledgement
    pub async fn join(&mut self, room_id: RoomId) -> Result<(), SessionError> {
        self.sink.send(ClientEvent::join(room_id)).await?;

        match self.source.recv().await {
            Some(Ok(ServerEvent::Ack { .. })) => Ok(()),
            Some(Ok(ServerEvent::Error { message })) => Err(SessionError::Protocol(message)),
            Some(Ok(event)) => Err(SessionError::Protocol(format!(
                "expected acknowledgement, got {event:?}"
            ))),
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed.into()),
        }
    }

    /// Post a message stamped with the current time
    pub async fn send_message(
        &mut self,
        room_id: RoomId,
        text: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Result<(), TransportError> {
        let event = ClientEvent::send(room_id, text, sender_id, Utc::now().timestamp());
        self.sink.send(event).await
    }

    /// Ask for every stored message of a room
    ///
    /// The reply arrives as a [`ServerEvent::History`] among the other events.
    pub async fn request_history(&mut self, room_id: RoomId) -> Result<(), TransportError> {
        self.sink.send(ClientEvent::history(room_id)).await
    }

    /// Ask for the latest stored message of a room
    pub async fn request_latest(&mut self, room_id: RoomId) -> Result<(), TransportError> {
        self.sink.send(ClientEvent::latest(room_id)).await
    }

    /// Wait for the next server event
    pub async fn next_event(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        self.source.recv().await
    }

    /// Stop sending; deliveries keep arriving until the server closes
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await
    }

    /// Split into the raw sink and source
    pub fn into_parts(self) -> (TcpEventSink, TcpEventSource) {
        (self.sink, self.source)
    }
}

/// Opens native sessions over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: ClientConfig,
}

impl TcpConnector {
    /// Create a connector
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError> {
        let (sink, source) = ChatClient::connect(&self.config).await?.into_parts();
        Ok((Box::new(sink), Box::new(source)))
    }
}
