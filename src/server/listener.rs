//! Chat server listeners
//!
//! Runs the native TCP accept loop and the WebSocket gateway accept loop and
//! spawns a task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::bridge::{room_path_param, Bridge, Connector, InProcessConnector};
use crate::client::{ClientConfig, TcpConnector};
use crate::error::{Result, TransportError};
use crate::protocol::{split_tcp, ClientEvent, ServerEvent, DEFAULT_CHANNEL_CAPACITY};
use crate::registry::RoomRegistry;
use crate::server::config::ServerConfig;
use crate::service::MessageService;
use crate::session::{SessionContext, SessionHandler};
use crate::stats::{ConnectionKind, ServerCounters, ServerStats};
use crate::store::MessageStore;

/// Room fan-out server
pub struct ChatServer {
    config: ServerConfig,
    service: Arc<MessageService>,
    handler: SessionHandler,
    bridge: Bridge,
    counters: Arc<ServerCounters>,
    next_session_id: Arc<AtomicU64>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl ChatServer {
    /// Create a server over a message store
    pub fn new(config: ServerConfig, store: Arc<dyn MessageStore>) -> Self {
        let registry = Arc::new(RoomRegistry::with_config(config.registry.clone()));
        let service = Arc::new(MessageService::with_config(
            store,
            registry,
            config.service.clone(),
        ));
        let handler = SessionHandler::new(Arc::clone(&service));
        let next_session_id = Arc::new(AtomicU64::new(1));

        let connector: Arc<dyn Connector> = match config.gateway_upstream {
            Some(addr) => Arc::new(TcpConnector::new(
                ClientConfig::new(addr)
                    .tcp_nodelay(config.tcp_nodelay)
                    .max_frame_size(config.max_frame_size),
            )),
            None => Arc::new(InProcessConnector::with_session_ids(
                handler.clone(),
                DEFAULT_CHANNEL_CAPACITY,
                Arc::clone(&next_session_id),
            )),
        };

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            service,
            handler,
            bridge: Bridge::new(connector),
            counters: Arc::new(ServerCounters::new()),
            next_session_id,
            connection_semaphore,
        }
    }

    /// Get the message service
    pub fn service(&self) -> &Arc<MessageService> {
        &self.service
    }

    /// Get the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.service.registry()
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection statistics
    pub fn stats(&self) -> ServerStats {
        self.counters.snapshot()
    }

    /// Run the server
    ///
    /// This method blocks until an accept loop fails to start.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let native = TcpListener::bind(self.config.native_addr).await?;
        let gateway = TcpListener::bind(self.config.gateway_addr).await?;

        self.serve_until(native, gateway, shutdown).await
    }

    /// Serve on already bound listeners until `shutdown` completes
    pub async fn serve_until<F>(
        &self,
        native: TcpListener,
        gateway: TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            native = %native.local_addr()?,
            gateway = %gateway.local_addr()?,
            upstream = ?self.config.gateway_upstream,
            "Chat server listening"
        );

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.native_accept_loop(&native) => result,
            result = self.gateway_accept_loop(&gateway) => result,
        }
    }

    async fn native_accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => self.handle_native(socket, peer_addr),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept native connection");
                }
            }
        }
    }

    async fn gateway_accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => self.handle_gateway(socket, peer_addr),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept gateway connection");
                }
            }
        }
    }

    fn handle_native(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let Some(guard) = self.admit(ConnectionKind::Native, peer_addr) else {
            return;
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id = session_id, peer = %peer_addr, "New native connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let (source, sink) =
            split_tcp::<ClientEvent, ServerEvent>(socket, self.config.max_frame_size);
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let ctx = SessionContext::new(session_id, ConnectionKind::Native).with_peer(peer_addr);

            if let Err(e) = handler.handle(ctx, source, sink).await {
                tracing::debug!(session_id = session_id, error = %e, "Session error");
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn handle_gateway(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let Some(guard) = self.admit(ConnectionKind::Gateway, peer_addr) else {
            return;
        };

        tracing::debug!(peer = %peer_addr, "New gateway connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let bridge = self.bridge.clone();
        let prefix = self.config.gateway_path_prefix.clone();

        tokio::spawn(async move {
            let _guard = guard;

            if let Err(e) = serve_gateway(&bridge, socket, &prefix).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Gateway connection error");
            }
        });
    }

    /// Apply the connection limit and count the connection
    fn admit(&self, kind: ConnectionKind, peer_addr: SocketAddr) -> Option<ConnectionGuard> {
        let permit = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.counters.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return None;
                }
            },
            None => None,
        };

        self.counters.connection_opened(kind);
        Some(ConnectionGuard {
            _permit: permit,
            counters: Arc::clone(&self.counters),
            kind,
        })
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

/// Holds a connection slot until the connection task ends
struct ConnectionGuard {
    _permit: Option<OwnedSemaphorePermit>,
    counters: Arc<ServerCounters>,
    kind: ConnectionKind,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counters.connection_closed(self.kind);
    }
}

/// Complete the WebSocket handshake and bridge the connection
///
/// Requests outside `prefix` are refused with 404 during the handshake.
pub async fn serve_gateway<S>(
    bridge: &Bridge,
    stream: S,
    prefix: &str,
) -> std::result::Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut room_param = None;

    let ws = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response: Response| {
        match room_path_param(request.uri().path(), prefix) {
            Some(param) => {
                room_param = Some(param.to_string());
                Ok(response)
            }
            None => {
                let mut refusal = ErrorResponse::new(Some("not found".to_string()));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                Err(refusal)
            }
        }
    })
    .await?;

    let raw_room_id = room_param.unwrap_or_default();
    bridge.serve(ws, &raw_room_id).await
}
