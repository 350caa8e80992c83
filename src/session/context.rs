//! Session context
//!
//! Identifying information about the connection behind a session, used for
//! logging.

use std::net::SocketAddr;

use crate::stats::ConnectionKind;

/// Context passed to the session handler
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address, if the transport has one
    pub peer_addr: Option<SocketAddr>,

    /// Transport the session arrived on
    pub kind: ConnectionKind,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, kind: ConnectionKind) -> Self {
        Self {
            session_id,
            peer_addr: None,
            kind,
        }
    }

    /// Attach the remote peer address
    pub fn with_peer(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }
}
