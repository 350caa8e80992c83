//! Framed byte-stream transport
//!
//! Runs the native protocol over any `AsyncRead`/`AsyncWrite` pair, in
//! practice the two halves of a TCP connection.

use std::io;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::codec::{decode_frame, encode_frame, WireEvent};
use super::transport::{EventSink, EventSource};
use crate::error::TransportError;

/// Initial read buffer size
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Decodes events from a byte stream
#[derive(Debug)]
pub struct FramedSource<R, T> {
    reader: R,
    buf: BytesMut,
    max_frame_size: usize,
    _event: PhantomData<fn() -> T>,
}

impl<R, T> FramedSource<R, T> {
    /// Wrap a reader
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            max_frame_size,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<R, T> EventSource<T> for FramedSource<R, T>
where
    R: AsyncRead + Unpin + Send,
    T: WireEvent,
{
    async fn recv(&mut self) -> Option<Result<T, TransportError>> {
        loop {
            match decode_frame::<T>(&mut self.buf, self.max_frame_size) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => return Some(Err(e.into())),
            }

            // read_buf only touches the buffer on completion, so this stays
            // cancel safe
            match self.reader.read_buf(&mut self.buf).await {
                Ok(0) if self.buf.is_empty() => return None,
                Ok(0) => {
                    return Some(Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    ))))
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Encodes events onto a byte stream
#[derive(Debug)]
pub struct FramedSink<W, T> {
    writer: W,
    buf: BytesMut,
    max_frame_size: usize,
    _event: PhantomData<fn(T)>,
}

impl<W, T> FramedSink<W, T> {
    /// Wrap a writer
    pub fn new(writer: W, max_frame_size: usize) -> Self {
        Self {
            writer,
            buf: BytesMut::new(),
            max_frame_size,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<W, T> EventSink<T> for FramedSink<W, T>
where
    W: AsyncWrite + Unpin + Send,
    T: WireEvent,
{
    async fn send(&mut self, event: T) -> Result<(), TransportError> {
        self.buf.clear();
        encode_frame(&event, &mut self.buf, self.max_frame_size)?;
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Split a TCP connection into a framed source and sink
pub fn split_tcp<In, Out>(
    stream: TcpStream,
    max_frame_size: usize,
) -> (
    FramedSource<OwnedReadHalf, In>,
    FramedSink<OwnedWriteHalf, Out>,
) {
    let (reader, writer) = stream.into_split();
    (
        FramedSource::new(reader, max_frame_size),
        FramedSink::new(writer, max_frame_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::DEFAULT_MAX_FRAME_SIZE;
    use crate::protocol::event::{ClientEvent, ServerEvent};
    use crate::store::RoomId;

    #[tokio::test]
    async fn test_events_over_byte_stream() {
        let (client_io, server_io) = tokio::io::duplex(64);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);

        let mut client_sink: FramedSink<_, ClientEvent> =
            FramedSink::new(client_write, DEFAULT_MAX_FRAME_SIZE);
        let mut client_source: FramedSource<_, ServerEvent> =
            FramedSource::new(client_read, DEFAULT_MAX_FRAME_SIZE);
        let mut server_source: FramedSource<_, ClientEvent> =
            FramedSource::new(server_read, DEFAULT_MAX_FRAME_SIZE);
        let mut server_sink: FramedSink<_, ServerEvent> =
            FramedSink::new(server_write, DEFAULT_MAX_FRAME_SIZE);

        // Larger than the duplex buffer, so frames arrive in pieces
        let text = "m".repeat(500);
        let writer = tokio::spawn(async move {
            client_sink.send(ClientEvent::join(RoomId(9))).await.unwrap();
            client_sink
                .send(ClientEvent::send(RoomId(9), text, "u1", 0))
                .await
                .unwrap();
            client_sink.close().await.unwrap();
        });

        assert_eq!(
            server_source.recv().await.unwrap().unwrap(),
            ClientEvent::join(RoomId(9))
        );
        match server_source.recv().await.unwrap().unwrap() {
            ClientEvent::Send { text, .. } => assert_eq!(text.len(), 500),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(server_source.recv().await.is_none());
        writer.await.unwrap();

        server_sink.send(ServerEvent::ack("joined")).await.unwrap();
        assert_eq!(
            client_source.recv().await.unwrap().unwrap(),
            ServerEvent::ack("joined")
        );
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_error() {
        let (mut raw, server_io) = tokio::io::duplex(64);
        let mut source: FramedSource<_, ClientEvent> =
            FramedSource::new(server_io, DEFAULT_MAX_FRAME_SIZE);

        raw.write_all(&[0, 0, 0, 5, 0x01]).await.unwrap();
        drop(raw);

        let result = source.recv().await.unwrap();
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
