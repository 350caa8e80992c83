//! WebSocket gateway bridge scenarios

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use roomcast::bridge::{
    Bridge, BoxEventSink, BoxEventSource, Connector, FAILED_TO_CONNECT, INVALID_ROOM_ID,
    STREAM_CLOSED,
};
use roomcast::client::{ChatClient, ClientConfig};
use roomcast::error::TransportError;
use roomcast::protocol::{duplex_pair, ClientEvent, EventSink, EventSource, ServerEnd, ServerEvent};
use roomcast::{ChatServer, InMemoryMessageStore, RoomId, ServerConfig};

/// Hands the server side of every opened session to the test
struct CapturingConnector {
    ends: mpsc::UnboundedSender<ServerEnd>,
}

#[async_trait]
impl Connector for CapturingConnector {
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError> {
        let (client, server) = duplex_pair(16);
        let _ = self.ends.send(server);
        Ok((Box::new(client.sink), Box::new(client.source)))
    }
}

async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (client, server)
}

/// Refuses every session
struct UnreachableConnector;

#[async_trait]
impl Connector for UnreachableConnector {
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError> {
        Err(TransportError::Closed)
    }
}

/// Opens sessions whose outbound side fails on the first receive
struct BrokenStreamConnector {
    ends: mpsc::UnboundedSender<ServerEnd>,
}

struct BrokenSource;

#[async_trait]
impl EventSource<ServerEvent> for BrokenSource {
    async fn recv(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        Some(Err(TransportError::Closed))
    }
}

#[async_trait]
impl Connector for BrokenStreamConnector {
    async fn connect(&self) -> Result<(BoxEventSink, BoxEventSource), TransportError> {
        let (client, server) = duplex_pair(16);
        let _ = self.ends.send(server);
        Ok((Box::new(client.sink), Box::new(BrokenSource)))
    }
}

struct RunningServer {
    server: Arc<ChatServer>,
    native_addr: SocketAddr,
    gateway_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<roomcast::Result<()>>,
}

async fn start_server(config: ServerConfig) -> RunningServer {
    let native = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let native_addr = native.local_addr().unwrap();
    let gateway_addr = gateway.local_addr().unwrap();

    let server = Arc::new(ChatServer::new(config, Arc::new(InMemoryMessageStore::new())));
    let (stop, stopped) = oneshot::channel::<()>();
    let running = Arc::clone(&server);
    let task = tokio::spawn(async move {
        running
            .serve_until(native, gateway, async {
                let _ = stopped.await;
            })
            .await
    });

    RunningServer {
        server,
        native_addr,
        gateway_addr,
        stop,
        task,
    }
}

async fn next_json<S>(ws: &mut WebSocketStream<S>) -> serde_json::Value
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match ws.next().await.unwrap().unwrap() {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {other:?}"),
    }
}

fn capturing_bridge() -> (Bridge, mpsc::UnboundedReceiver<ServerEnd>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Bridge::new(Arc::new(CapturingConnector { ends: tx })), rx)
}

async fn next_text(ws: &mut WebSocketStream<DuplexStream>) -> String {
    match ws.next().await.unwrap().unwrap() {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("unexpected frame {other:?}"),
    }
}

#[tokio::test]
async fn test_frame_forwarded_as_send() {
    let (bridge, mut sessions) = capturing_bridge();
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "7").await });
    let mut session = sessions.recv().await.unwrap();

    assert_eq!(
        session.source.recv().await.unwrap().unwrap(),
        ClientEvent::join(RoomId(7))
    );

    client
        .send(Message::text(r#"{"message":"yo","sender":"u2"}"#))
        .await
        .unwrap();

    match session.source.recv().await.unwrap().unwrap() {
        ClientEvent::Send {
            room_id,
            text,
            sender_id,
            sent_at_unix,
        } => {
            assert_eq!(room_id, RoomId(7));
            assert_eq!(text, "yo");
            assert_eq!(sender_id, "u2");
            assert!((Utc::now().timestamp() - sent_at_unix).abs() <= 5);
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Native session ends, bridge reports it and closes the socket
    session.sink.close().await.unwrap();
    assert_eq!(next_text(&mut client).await, STREAM_CLOSED);
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let (bridge, mut sessions) = capturing_bridge();
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "7").await });
    let mut session = sessions.recv().await.unwrap();
    session.source.recv().await.unwrap().unwrap();

    client.send(Message::text(r#"{"message":"#)).await.unwrap();

    // Nothing forwarded for the malformed frame
    let quiet = tokio::time::timeout(Duration::from_millis(100), session.source.recv()).await;
    assert!(quiet.is_err());

    // Connection is still usable in both directions
    session.sink.send(ServerEvent::ack("joined")).await.unwrap();
    assert_eq!(
        next_text(&mut client).await,
        r#"{"type":"ack","message":"joined"}"#
    );

    client
        .send(Message::text(r#"{"message":"after","sender":"u3","sent_at_unix":1700000000}"#))
        .await
        .unwrap();
    assert_eq!(
        session.source.recv().await.unwrap().unwrap(),
        ClientEvent::send(RoomId(7), "after", "u3", 1_700_000_000)
    );

    session.sink.close().await.unwrap();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_socket_close_ends_native_sends() {
    let (bridge, mut sessions) = capturing_bridge();
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "11").await });
    let mut session = sessions.recv().await.unwrap();
    session.source.recv().await.unwrap().unwrap();

    client.close(None).await.unwrap();

    // The native side sees end of input, but can still write
    assert!(session.source.recv().await.is_none());
    session.sink.close().await.unwrap();

    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_room_id() {
    let (bridge, mut sessions) = capturing_bridge();
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "abc").await });

    assert_eq!(next_text(&mut client).await, INVALID_ROOM_ID);
    serve.await.unwrap().unwrap();

    // No session was opened
    assert!(sessions.try_recv().is_err());
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let bridge = Bridge::new(Arc::new(UnreachableConnector));
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "7").await });

    assert_eq!(next_text(&mut client).await, FAILED_TO_CONNECT);
    assert!(matches!(serve.await.unwrap(), Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_native_receive_failure_is_reported() {
    let (tx, mut sessions) = mpsc::unbounded_channel();
    let bridge = Bridge::new(Arc::new(BrokenStreamConnector { ends: tx }));
    let (mut client, server) = socket_pair().await;

    let serve = tokio::spawn(async move { bridge.serve(server, "7").await });
    let _session = sessions.recv().await.unwrap();

    assert_eq!(next_text(&mut client).await, STREAM_CLOSED);
    assert!(matches!(serve.await.unwrap(), Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let running = start_server(ServerConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{}/api/v1/ws/rooms/7",
        running.gateway_addr
    ))
    .await
    .unwrap();

    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["message"], "joined");

    let mut native_client = ChatClient::connect(&ClientConfig::new(running.native_addr))
        .await
        .unwrap();
    native_client.join(RoomId(7)).await.unwrap();
    native_client
        .send_message(RoomId(7), "hi", "u1")
        .await
        .unwrap();

    let delivered = next_json(&mut ws).await;
    assert_eq!(delivered["type"], "delivered");
    assert_eq!(delivered["room_id"], 7);
    assert_eq!(delivered["text"], "hi");
    assert_eq!(delivered["sender_id"], "u1");

    ws.send(Message::text(r#"{"message":"yo","sender":"u2"}"#))
        .await
        .unwrap();

    let mut texts = Vec::new();
    while texts.len() < 2 {
        match native_client.next_event().await.unwrap().unwrap() {
            ServerEvent::Delivered { text, .. } => texts.push(text),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(texts, ["hi", "yo"]);

    assert_eq!(running.server.stats().total_gateway_connections, 1);

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_gateway_forwards_to_upstream_server() {
    let upstream = start_server(ServerConfig::default()).await;
    let front = start_server(ServerConfig::default().gateway_upstream(upstream.native_addr)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{}/api/v1/ws/rooms/7",
        front.gateway_addr
    ))
    .await
    .unwrap();
    assert_eq!(next_json(&mut ws).await["type"], "ack");

    // The bridged session lives on the upstream server
    assert_eq!(upstream.server.registry().subscriber_count(RoomId(7)), 1);
    assert_eq!(front.server.registry().subscriber_count(RoomId(7)), 0);

    let mut native_client = ChatClient::connect(&ClientConfig::new(upstream.native_addr))
        .await
        .unwrap();
    native_client.join(RoomId(7)).await.unwrap();
    native_client
        .send_message(RoomId(7), "from native", "u1")
        .await
        .unwrap();

    let delivered = next_json(&mut ws).await;
    assert_eq!(delivered["type"], "delivered");
    assert_eq!(delivered["text"], "from native");

    ws.send(Message::text(r#"{"message":"from socket","sender":"u2"}"#))
        .await
        .unwrap();
    let mut seen = Vec::new();
    while seen.len() < 2 {
        match native_client.next_event().await.unwrap().unwrap() {
            ServerEvent::Delivered {
                text, sender_id, ..
            } => seen.push((text, sender_id)),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(
        seen,
        [
            ("from native".to_string(), "u1".to_string()),
            ("from socket".to_string(), "u2".to_string()),
        ]
    );

    // The socket's own copy arrives before the history reply
    assert_eq!(next_json(&mut ws).await["text"], "from socket");

    ws.send(Message::text(r#"{"type":"history"}"#)).await.unwrap();
    let history = next_json(&mut ws).await;
    assert_eq!(history["type"], "history");
    assert_eq!(history["room_id"], 7);
    let texts: Vec<_> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, ["from native", "from socket"]);

    assert_eq!(upstream.server.stats().total_native_connections, 2);
    assert_eq!(front.server.stats().total_gateway_connections, 1);

    front.stop.send(()).unwrap();
    front.task.await.unwrap().unwrap();
    upstream.stop.send(()).unwrap();
    upstream.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_gateway_rejects_unknown_path() {
    let running = start_server(ServerConfig::default()).await;

    let result =
        tokio_tungstenite::connect_async(format!("ws://{}/chat/7", running.gateway_addr)).await;
    match result {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 404),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("handshake should be refused"),
    }

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}
